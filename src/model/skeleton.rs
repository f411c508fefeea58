// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use glam::{Mat4, Quat, Vec3};

use crate::bc;
use crate::error::{Error, Result};
use crate::mxmd::{v1, v3, Matrix};

pub(crate) fn matrix(matrix: &Matrix) -> Mat4 {
    Mat4::from_cols_array_2d(matrix)
}

/// Local transform of a bone, in whichever form the file stores it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoneTransform {
    Matrix(Mat4),
    Rts {
        translation: Vec3,
        rotation: Quat,
        scale: Vec3,
    },
}

impl BoneTransform {
    pub fn to_matrix(&self) -> Mat4 {
        match *self {
            BoneTransform::Matrix(matrix) => matrix,
            BoneTransform::Rts {
                translation,
                rotation,
                scale,
            } => Mat4::from_scale_rotation_translation(scale, rotation, translation),
        }
    }
}

impl From<&bc::Rts> for BoneTransform {
    fn from(rts: &bc::Rts) -> Self {
        BoneTransform::Rts {
            translation: Vec3::from_slice(&rts.translation[..3]),
            rotation: Quat::from_array(rts.rotation),
            scale: Vec3::from_slice(&rts.scale[..3]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone<'a> {
    pub index: usize,
    pub parent: Option<usize>,
    pub name: &'a str,
    pub transform: BoneTransform,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton<'a> {
    pub bones: Vec<Bone<'a>>,
}

impl<'a> Skeleton<'a> {
    pub(crate) fn from_v1(bones: &'a [v1::Bone]) -> Self {
        Skeleton {
            bones: bones
                .iter()
                .enumerate()
                .map(|(index, bone)| Bone {
                    index,
                    parent: bone.parent,
                    name: &bone.name,
                    transform: BoneTransform::Matrix(matrix(&bone.transform)),
                })
                .collect(),
        }
    }

    /// Skin nodes carry neither a hierarchy nor a rest pose.
    pub(crate) fn from_v3(skin: &'a v3::Skin) -> Self {
        Skeleton {
            bones: skin
                .bones
                .iter()
                .enumerate()
                .map(|(index, bone)| Bone {
                    index,
                    parent: None,
                    name: &bone.name,
                    transform: BoneTransform::from(&bc::Rts::default()),
                })
                .collect(),
        }
    }

    pub fn from_bc(skeleton: &'a bc::Skeleton) -> Self {
        Skeleton {
            bones: skeleton
                .bones
                .iter()
                .enumerate()
                .map(|(index, bone)| Bone {
                    index,
                    parent: bone.parent,
                    name: &bone.name,
                    transform: BoneTransform::from(&bone.transform),
                })
                .collect(),
        }
    }

    /// Transform of the bone at `index` in model space.
    pub fn world_transform(&self, index: usize) -> Result<Mat4> {
        let mut transform = Mat4::IDENTITY;
        let mut current = Some(index);
        let mut depth = 0;
        while let Some(at) = current {
            if depth == self.bones.len() {
                return Err(Error::invariant(format!("bone {index} is its own ancestor")));
            }
            let bone = self
                .bones
                .get(at)
                .ok_or_else(|| Error::invariant(format!("bone {at} of {}", self.bones.len())))?;
            transform = bone.transform.to_matrix() * transform;
            current = bone.parent;
            depth += 1;
        }
        Ok(transform)
    }
}

/// A skeleton node used by a skin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinNode {
    /// Bone in the skeleton, or the placement for instanced props.
    pub node: usize,
    /// Inverse bind matrix, or the world transform of a placement.
    pub transform: Mat4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skin {
    pub nodes: Vec<SkinNode>,
}

impl Skin {
    pub(crate) fn from_v1(skin: &v1::MeshSkin, bones: &[v1::Bone]) -> Result<Self> {
        let nodes = skin
            .bone_indices
            .iter()
            .map(|&node| {
                let bone = bones
                    .get(node as usize)
                    .ok_or_else(|| {
                        Error::invariant(format!("skin uses bone {node} of {}", bones.len()))
                    })?;
                Ok(SkinNode {
                    node: node.into(),
                    transform: matrix(&bone.inverse_bind),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Skin { nodes })
    }

    pub(crate) fn from_v3(skin: &v3::Skin) -> Self {
        Skin {
            nodes: skin
                .inverse_binds
                .iter()
                .enumerate()
                .map(|(node, inverse_bind)| SkinNode {
                    node,
                    transform: matrix(inverse_bind),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(parent: Option<usize>, y: f32) -> bc::skel::Bone {
        bc::skel::Bone {
            name: String::from("bone"),
            parent,
            transform: bc::Rts {
                translation: [0.0, y, 0.0, 0.0],
                ..Default::default()
            },
        }
    }

    #[test]
    fn world_transform_walks_parents() {
        let skeleton = bc::Skeleton {
            root_bone_name: String::from("bone"),
            bones: vec![bone(None, 1.0), bone(Some(0), 2.0), bone(Some(1), 4.0)],
        };
        let view = Skeleton::from_bc(&skeleton);
        assert_eq!(view.bones[2].parent, Some(1));
        let world = view.world_transform(2).unwrap();
        assert_eq!(world.w_axis.y, 7.0);
    }

    #[test]
    fn cycles_are_rejected() {
        let skeleton = bc::Skeleton {
            root_bone_name: String::new(),
            bones: vec![bone(Some(1), 0.0), bone(Some(0), 0.0)],
        };
        let view = Skeleton::from_bc(&skeleton);
        assert!(matches!(view.world_transform(0), Err(Error::Invariant { .. })));
    }
}
