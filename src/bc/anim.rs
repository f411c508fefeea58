// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::binrw;

use crate::bc::{BcArray, Rts};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pointer::Pointer64;

pub const ANIM_MAGIC: [u8; 4] = *b"ANIM";

/// Coefficients of `a*t^3 + b*t^2 + c*t + d`.
pub type CubicCurve = [f32; 4];

fn evaluate(curve: &CubicCurve, delta: f32) -> f32 {
    let [a, b, c, d] = *curve;
    ((a * delta + b) * delta + c) * delta + d
}

/// A keyframe holding one curve per component.
pub trait Keyframe {
    fn frame(&self) -> f32;

    /// Components at `delta` frames past this key. Missing components keep `fallback`.
    fn evaluate(&self, delta: f32, fallback: [f32; 4]) -> [f32; 4];
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicVector3Frame {
    pub frame: f32,
    pub elements: [CubicCurve; 3],
}

impl Keyframe for CubicVector3Frame {
    fn frame(&self) -> f32 {
        self.frame
    }

    fn evaluate(&self, delta: f32, mut fallback: [f32; 4]) -> [f32; 4] {
        for (out, curve) in fallback.iter_mut().zip(&self.elements) {
            *out = evaluate(curve, delta);
        }
        fallback
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicQuatFrame {
    pub frame: f32,
    pub elements: [CubicCurve; 4],
}

impl Keyframe for CubicQuatFrame {
    fn frame(&self) -> f32 {
        self.frame
    }

    fn evaluate(&self, delta: f32, _: [f32; 4]) -> [f32; 4] {
        self.elements.map(|curve| evaluate(&curve, delta))
    }
}

/// Evaluates the key at or before `time`, or the first key when `time` precedes every key.
fn sample_keys<K: Keyframe>(keys: &[K], time: f32, fallback: [f32; 4]) -> [f32; 4] {
    let next = keys.iter().position(|key| key.frame() > time).unwrap_or(keys.len());
    match keys.get(next.saturating_sub(1)) {
        Some(key) => key.evaluate((time - key.frame()).max(0.0), fallback),
        None => fallback,
    }
}

#[binrw]
#[derive(Debug)]
struct RawTrack {
    position: BcArray<CubicVector3Frame>,
    rotation: BcArray<CubicQuatFrame>,
    scale: BcArray<CubicVector3Frame>,
}

/// Keys of one bone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationTrack {
    pub position: Vec<CubicVector3Frame>,
    pub rotation: Vec<CubicQuatFrame>,
    pub scale: Vec<CubicVector3Frame>,
}

impl AnimationTrack {
    /// The local transform at `time`, in frames. Channels without keys stay at rest.
    pub fn sample(&self, time: f32) -> Rts {
        let rest = Rts::default();
        Rts {
            translation: sample_keys(&self.position, time, rest.translation),
            rotation: sample_keys(&self.rotation, time, rest.rotation),
            scale: sample_keys(&self.scale, time, rest.scale),
        }
    }
}

#[binrw]
#[derive(Debug)]
struct RawEvent {
    trigger_frame: f32,
    padding: u32,
    group_name: Pointer64<u8>,
    event_name: Pointer64<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub trigger_frame: f32,
    pub group_name: String,
    pub event_name: String,
}

#[binrw]
#[derive(Debug)]
struct RawMorphTrack {
    null00: u64,
    name: Pointer64<u8>,
    null01: u32,
    padding: u32,
    track: BcArray<f32>,
}

/// Weights of one morph target over time.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphTrack {
    pub name: String,
    pub track: Vec<f32>,
}

#[binrw]
#[derive(Debug)]
struct RawControlTrack {
    morphs: Pointer64<RawMorphTrack>,
    ids: BcArray<i16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlTrack {
    pub morphs: Option<MorphTrack>,
    pub ids: Vec<i16>,
}

#[binrw]
#[derive(Debug)]
struct RawAnimationData {
    null00: BcArray<u8>,
    null01: u64,
    null02: u64,
    bones: BcArray<i16>,
    control_tracks: BcArray<RawControlTrack>,
}

#[binrw]
#[derive(Debug)]
struct RawHeader {
    unk: u32,
    id: [u8; 4],
    data: Pointer64<RawAnimationData>,
    null00: BcArray<u8>,
    null01: u64,
    name: Pointer64<u8>,
    unk01: [i16; 2],
    frame_rate: f32,
    frame_time: f32,
    frame_count: u32,
    events: BcArray<RawEvent>,
    null02: u64,
    tracks: BcArray<RawTrack>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub unk01: [i16; 2],
    pub frame_rate: f32,
    pub frame_time: f32,
    pub frame_count: u32,
    pub events: Vec<Event>,
    /// Skeleton bone animated by each track.
    pub bones: Vec<i16>,
    pub control_tracks: Vec<ControlTrack>,
    pub tracks: Vec<AnimationTrack>,
}

impl Animation {
    pub(crate) fn read(ctx: &Context<'_>, at: usize) -> Result<Self> {
        let raw: RawHeader = ctx.read(at)?;

        let events = ctx
            .values(raw.events.pointer(), raw.events.len())?
            .into_iter()
            .map(|event| {
                Ok(Event {
                    trigger_frame: event.trigger_frame,
                    group_name: ctx.string(event.group_name)?,
                    event_name: ctx.string(event.event_name)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let tracks = ctx
            .values(raw.tracks.pointer(), raw.tracks.len())?
            .into_iter()
            .map(|track| {
                Ok(AnimationTrack {
                    position: ctx.values(track.position.pointer(), track.position.len())?,
                    rotation: ctx.values(track.rotation.pointer(), track.rotation.len())?,
                    scale: ctx.values(track.scale.pointer(), track.scale.len())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let (bones, control_tracks) = match ctx.resolve(raw.data)? {
            Some(data_at) => {
                let data: RawAnimationData = ctx.read(data_at)?;
                let control_tracks = ctx
                    .values(data.control_tracks.pointer(), data.control_tracks.len())?
                    .into_iter()
                    .map(|control| {
                        let morphs = match ctx.resolve(control.morphs)? {
                            Some(morph_at) => {
                                let morph: RawMorphTrack = ctx.read(morph_at)?;
                                Some(MorphTrack {
                                    name: ctx.string(morph.name)?,
                                    track: ctx.values(morph.track.pointer(), morph.track.len())?,
                                })
                            }
                            None => None,
                        };
                        Ok(ControlTrack {
                            morphs,
                            ids: ctx.values(control.ids.pointer(), control.ids.len())?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                (ctx.values(data.bones.pointer(), data.bones.len())?, control_tracks)
            }
            None => (Vec::new(), Vec::new()),
        };

        if !bones.is_empty() && bones.len() != tracks.len() {
            return Err(Error::invariant(format!(
                "{} animated bones for {} tracks",
                bones.len(),
                tracks.len()
            )));
        }

        Ok(Animation {
            name: ctx.string(raw.name)?,
            unk01: raw.unk01,
            frame_rate: raw.frame_rate,
            frame_time: raw.frame_time,
            frame_count: raw.frame_count,
            events,
            bones,
            control_tracks,
            tracks,
        })
    }

    /// Samples `track` at `time`, clamped to the animation's frame range.
    pub fn sample(&self, track: usize, time: f32) -> Option<Rts> {
        let time = time.clamp(0.0, self.frame_count as f32);
        self.tracks.get(track).map(|track| track.sample(time))
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        match self.frame_rate {
            rate if rate > 0.0 => self.frame_count as f32 / rate,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::bc::tests::{finish, header};
    use crate::bc::Bc;
    use crate::context::ProcessOptions;
    use crate::test_util::Builder;

    const LINEAR: CubicCurve = [0.0, 0.0, 1.0, 0.0];

    fn constant(value: f32) -> CubicCurve {
        [0.0, 0.0, 0.0, value]
    }

    #[test]
    fn cubic_curve() {
        assert_eq!(evaluate(&[1.0, 0.0, 0.0, 0.0], 2.0), 8.0);
        assert_eq!(evaluate(&[1.0, 2.0, 3.0, 4.0], 1.0), 10.0);
    }

    #[test]
    fn sample_between_keys() {
        let track = AnimationTrack {
            position: vec![
                CubicVector3Frame {
                    frame: 0.0,
                    elements: [LINEAR, constant(0.0), constant(0.0)],
                },
                CubicVector3Frame {
                    frame: 1.0,
                    elements: [constant(10.0), constant(0.0), constant(0.0)],
                },
            ],
            rotation: vec![CubicQuatFrame {
                frame: 0.0,
                elements: [constant(0.0), constant(0.0), constant(1.0), constant(0.0)],
            }],
            scale: Vec::new(),
        };

        assert_eq!(track.sample(0.5).translation[0], 0.5);
        assert_eq!(track.sample(1.5).translation[0], 10.0);
        assert_eq!(track.sample(20.0).translation[0], 10.0);
        assert_eq!(track.sample(0.5).rotation, [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(track.sample(0.5).scale, Rts::default().scale);
    }

    #[test]
    fn read_animation() {
        let mut b = Builder::new(Endian::Little);
        header(&mut b);
        let block = b.pos();
        b.u32(0).bytes(&ANIM_MAGIC).u64(0).zeros(16).u64(0).u64(0);
        b.i16(1).i16(2).f32(30.0).f32(1.0 / 30.0).u32(60);
        b.u64(0).u32(1).u32(0).u64(0).u64(0).u32(1).u32(0);

        let event = b.pos();
        b.f32(12.0).u32(0).u64(0).u64(0);
        let track = b.pos();
        b.u64(0).u32(1).u32(0).zeros(32);
        let key = b.pos();
        b.f32(0.0).f32s(&constant(4.0)).f32s(&LINEAR).f32s(&constant(0.0));
        let name = b.pos();
        b.cstr("walk");
        let group = b.pos();
        b.cstr("sound");
        let event_name = b.pos();
        b.cstr("step");

        let mut pointers = Vec::new();
        for (at, target) in [
            (block + 40, name),
            (block + 64, event),
            (block + 88, track),
            (event + 8, group),
            (event + 16, event_name),
            (track, key),
        ] {
            b.patch_u64(at, target as u64);
            pointers.push(at);
        }
        let data = finish(&mut b, &pointers);

        let bc = Bc::from_existing(&data, &ProcessOptions::default()).unwrap();
        let animation = bc.animation().unwrap();
        assert_eq!(animation.name, "walk");
        assert_eq!(animation.frame_count, 60);
        assert_eq!(animation.duration(), 2.0);
        assert_eq!(animation.events[0].event_name, "step");
        assert_eq!(animation.events[0].trigger_frame, 12.0);
        assert!(animation.bones.is_empty());

        let rest = animation.sample(0, 3.0).unwrap();
        assert_eq!(rest.translation[..3], [4.0, 3.0, 0.0]);
        assert!(animation.sample(1, 0.0).is_none());
    }
}
