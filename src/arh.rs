// SPDX-FileCopyrightText: 2025 Joshua Goins <josh@redstrate.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use binrw::{binrw, Endian};
use tracing::{debug, trace};

use crate::common_file_operations::{null_terminated_bytes, read_bool_from};
use crate::context::{Context, ProcessOptions};
use crate::detect::expect_magic;
use crate::error::{Error, Result};
use crate::pointer::DataRange;
use crate::xbc1::XBC1_HEADER_SIZE;
use crate::ByteSpan;

pub const ARH_MAGIC: [u8; 4] = *b"arh1";

#[binrw]
#[derive(Debug)]
struct Header {
    magic: [u8; 4],
    key_seed: u32,
    num_nodes: u32,
    tail_buffer: u32,
    tail_buffer_size: u32,
    trie_buffer: u32,
    trie_buffer_size: u32,
    file_entries: u32,
    num_files: u32,
    unk: u32,
}

#[binrw]
#[derive(Debug, Clone, Copy)]
struct Node {
    /// Negative values point into the tail buffer.
    a: i32,
    /// Parent node, or the next node to try.
    b: i32,
}

#[binrw]
#[derive(Debug)]
struct RawEntry {
    data_offset: u64,
    compressed_size: u32,
    uncompressed_size: u32,
    compressed: u32,
    index: u32,
}

/// A file stored in the companion data archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArhEntry {
    /// Full path, rebuilt from the name trie.
    pub path: String,
    pub data_offset: u64,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// Whether the data is an xbc1 block.
    pub compressed: bool,
}

impl ArhEntry {
    /// Bytes to read from the data archive, including the block header of compressed files.
    pub fn stored_size(&self) -> usize {
        if self.compressed {
            self.compressed_size as usize + XBC1_HEADER_SIZE
        } else {
            self.compressed_size as usize
        }
    }

    /// The entry's bytes inside a data archive of `len` bytes.
    pub fn data_range(&self, len: usize) -> Result<DataRange> {
        let offset = usize::try_from(self.data_offset).map_err(|_| Error::CorruptOffset {
            offset: i64::MAX,
            size: self.stored_size(),
            len,
        })?;
        DataRange::new(offset, self.stored_size(), len)
    }
}

/// Index of an ARD data archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arh {
    /// Files in index order.
    pub entries: Vec<ArhEntry>,
}

/// Path and file index decoded from the trie.
struct Leaf {
    path: String,
    file: usize,
}

impl Arh {
    /// Reads an existing index, decrypting its name trie.
    pub fn from_existing(buffer: ByteSpan, options: &ProcessOptions) -> Result<Arh> {
        expect_magic(buffer, &ARH_MAGIC)?;
        let endian = options.byte_order("ARH", Some(Endian::Little), &[Endian::Little])?;
        let ctx = Context::new(buffer, endian, options.exclude);
        let header: Header = ctx.read(0)?;
        debug!(files = header.num_files, nodes = header.num_nodes, "Decoding ARH");

        let key = ctx.read::<u32>(header.tail_buffer as usize)? ^ header.key_seed;
        let tail_words = (header.tail_buffer_size as usize / 4).saturating_sub(1);
        let tail: Vec<u8> = ctx
            .values_at::<u32>(header.tail_buffer as usize + 4, tail_words)?
            .into_iter()
            .flat_map(|word| (word ^ key).to_le_bytes())
            .collect();

        let nodes: Vec<Node> = ctx
            .values_at::<Node>(header.trie_buffer as usize, header.trie_buffer_size as usize / 8)?
            .into_iter()
            .map(|node| Node {
                a: node.a ^ key as i32,
                b: node.b ^ key as i32,
            })
            .collect();

        let mut paths = vec![None; header.num_files as usize];
        for (index, node) in nodes.iter().enumerate() {
            if node.a < 0 && node.b > 0 {
                let leaf = read_leaf(&nodes, &tail, index, *node)?;
                let slot = paths.get_mut(leaf.file).ok_or_else(|| {
                    Error::invariant(format!(
                        "trie leaf names file {} of {}",
                        leaf.file, header.num_files
                    ))
                })?;
                *slot = Some(leaf.path);
            }
        }

        let entries = ctx
            .values_at::<RawEntry>(header.file_entries as usize, header.num_files as usize)?
            .into_iter()
            .map(|raw| {
                let path = paths
                    .get(raw.index as usize)
                    .cloned()
                    .flatten()
                    .ok_or_else(|| Error::invariant(format!("file {} has no name", raw.index)))?;
                Ok(ArhEntry {
                    path,
                    data_offset: raw.data_offset,
                    compressed_size: raw.compressed_size,
                    uncompressed_size: raw.uncompressed_size,
                    compressed: read_bool_from(raw.compressed),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Arh { entries })
    }

    pub fn find(&self, path: &str) -> Option<&ArhEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }
}

/// Walks from a leaf back to the root, collecting one character per parent.
fn read_leaf(nodes: &[Node], tail: &[u8], index: usize, node: Node) -> Result<Leaf> {
    // the tail buffer offset includes the key word that was stripped
    let tail_at = (-(node.a as i64) - 4) as usize;
    let name = null_terminated_bytes(tail, tail_at)?;
    let file_at = tail_at + name.len() + 1;
    let file = tail
        .get(file_at..file_at + 4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(Error::CorruptOffset {
            offset: file_at as i64,
            size: 4,
            len: tail.len(),
        })?;

    let mut prefix = Vec::new();
    let mut parent = node.b;
    let mut current = index as i32;
    while parent != 0 {
        if prefix.len() > nodes.len() {
            return Err(Error::invariant("name trie has a cycle"));
        }
        let parent_node = nodes
            .get(parent as usize)
            .ok_or_else(|| Error::invariant(format!("trie parent {parent} is out of range")))?;
        prefix.push((parent_node.a ^ current) as u8);
        current = parent;
        parent = parent_node.b;
    }
    prefix.reverse();
    prefix.extend_from_slice(name);

    let path = String::from_utf8_lossy(&prefix).into_owned();
    trace!(path = %path, file, "Found ARH leaf");
    Ok(Leaf {
        path,
        file: file as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::Builder;

    const KEY: u32 = 0x5A5A_1234;
    const SEED: u32 = 0x0F0F_0F0F;

    /// An index holding `ab.x` as file 0, built from a four node trie.
    fn index() -> Vec<u8> {
        index_with_suffix(b".x")
    }

    /// An index holding `ab` followed by `suffix` as file 0.
    fn index_with_suffix(suffix: &[u8]) -> Vec<u8> {
        let mut b = Builder::new(Endian::Little);
        b.bytes(b"arh1").u32(SEED).u32(3).zeros(28);

        // tail: key word, then the suffix and the file index
        let tail_at = b.pos();
        let mut tail = suffix.to_vec();
        tail.push(0);
        tail.extend_from_slice(&0u32.to_le_bytes());
        tail.resize(tail.len().next_multiple_of(4), 0);
        b.u32(KEY ^ SEED);
        for word in tail.chunks(4) {
            b.u32(u32::from_le_bytes(word.try_into().unwrap()) ^ KEY);
        }
        let tail_size = b.pos() - tail_at;

        // node 0 is the root, node 1 holds 'a', node 2 holds 'b' and the leaf is node 3
        let trie_at = b.pos();
        let nodes: [(i32, i32); 4] = [(0, 0), ('a' as i32 ^ 2, 0), ('b' as i32 ^ 3, 1), (-4, 2)];
        for (a, parent) in nodes {
            b.u32((a ^ KEY as i32) as u32).u32((parent ^ KEY as i32) as u32);
        }

        let entries_at = b.pos();
        b.u64(0x100).u32(10).u32(20).u32(1).u32(0);

        b.patch_u32(12, tail_at as u32)
            .patch_u32(16, tail_size as u32)
            .patch_u32(20, trie_at as u32)
            .patch_u32(24, 32)
            .patch_u32(28, entries_at as u32)
            .patch_u32(32, 1);
        b.finish()
    }

    #[test]
    fn rebuild_paths() {
        let data = index();
        let arh = Arh::from_existing(&data, &ProcessOptions::default()).unwrap();
        let entry = &arh.entries[0];
        assert_eq!(entry.path, "ab.x");
        assert!(entry.compressed);
        assert_eq!(entry.stored_size(), 10 + XBC1_HEADER_SIZE);
        assert!(entry.data_range(0x100).is_err());
        assert_eq!(entry.data_range(0x200).unwrap().offset(), 0x100);
    }

    #[test]
    fn file_index_follows_raw_suffix() {
        let data = index_with_suffix(b".\xFF\xFE");
        let arh = Arh::from_existing(&data, &ProcessOptions::default()).unwrap();
        assert_eq!(arh.entries[0].path, "ab.\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn parent_out_of_range() {
        let mut data = index();
        // node 3's parent becomes 9
        let trie_at = u32::from_le_bytes(data[20..24].try_into().unwrap()) as usize;
        let b_at = trie_at + 3 * 8 + 4;
        let value = 9i32 ^ KEY as i32;
        data[b_at..b_at + 4].copy_from_slice(&value.to_le_bytes());
        assert!(matches!(
            Arh::from_existing(&data, &ProcessOptions::default()),
            Err(Error::Invariant { .. })
        ));
    }
}
