//! Flat serialization of a Huffman tree.
//!
//! A packet is a run of 6 byte records, one per node in pre-order:
//!
//! ```text
//! [value: u8][frequency: 4 bytes, big-endian][flag: u8]
//! ```
//!
//! The flag tells the reader which children follow: `A` none, `B` right
//! only, `C` left only, `D` both. Absent children take no space, so a
//! packet holds exactly one record per node.

use log::trace;

use crate::error::{Error, Result};
use crate::tree::{HuffmanTree, TreeNode, Weight};

/// bytes per node in a tree packet
pub const RECORD_LEN: usize = 6;

/// A byte alphabet never needs more than 256 leaves and 255 merge nodes.
pub const MAX_NODES: usize = 511;

/// Which children of a node are present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildFlag {
    Neither,
    RightOnly,
    LeftOnly,
    Both,
}

impl ChildFlag {
    pub fn of(node: &TreeNode) -> ChildFlag {
        match (&node.left, &node.right) {
            (None, None) => ChildFlag::Neither,
            (None, Some(_)) => ChildFlag::RightOnly,
            (Some(_), None) => ChildFlag::LeftOnly,
            (Some(_), Some(_)) => ChildFlag::Both,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            ChildFlag::Neither => b'A',
            ChildFlag::RightOnly => b'B',
            ChildFlag::LeftOnly => b'C',
            ChildFlag::Both => b'D',
        }
    }

    pub fn from_byte(byte: u8) -> Result<ChildFlag> {
        match byte {
            b'A' => Ok(ChildFlag::Neither),
            b'B' => Ok(ChildFlag::RightOnly),
            b'C' => Ok(ChildFlag::LeftOnly),
            b'D' => Ok(ChildFlag::Both),
            other => Err(Error::invalid_input(format!(
                "unknown child flag {other:#04x} in tree packet"
            ))),
        }
    }
}

/// Converts a non-negative 32 bit integer into 4 big-endian bytes.
pub fn int_to_bytes(num: i64) -> Result<[u8; 4]> {
    if num < 0 {
        return Err(Error::invalid_input(format!(
            "{num} is negative and cannot be stored"
        )));
    }
    let num = i32::try_from(num).map_err(|_| {
        Error::invalid_input(format!("{num} does not fit in a 32 bit integer"))
    })?;
    Ok(num.to_be_bytes())
}

/// Reads exactly 4 big-endian bytes back into an integer.
pub fn bytes_to_int(bytes: &[u8]) -> Result<i32> {
    let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
        Error::invalid_input(format!(
            "expected 4 bytes for an integer, got {}",
            bytes.len()
        ))
    })?;
    Ok(i32::from_be_bytes(bytes))
}

pub fn tree_packet(tree: &HuffmanTree) -> Result<Vec<u8>> {
    tree_packet_of(Some(tree.root()))
}

/// Packs the tree rooted at `root` in pre-order. Fails if there is no tree.
pub fn tree_packet_of(root: Option<&TreeNode>) -> Result<Vec<u8>> {
    let root = root.ok_or_else(|| Error::invalid_input("tree is empty"))?;
    let mut packet = Vec::new();
    for node in root.pre_order() {
        packet.push(node.value);
        packet.extend_from_slice(&int_to_bytes(i64::from(node.frequency))?);
        packet.push(ChildFlag::of(node).as_byte());
    }
    trace!("packed {} tree nodes", packet.len() / RECORD_LEN);
    Ok(packet)
}

struct Record {
    value: u8,
    frequency: Weight,
    flag: ChildFlag,
}

/// Relinks parsed records. `cursor` is the index of the last record
/// handed out; each child claims the next one.
struct Reconstructor {
    records: Vec<Record>,
    cursor: usize,
}

impl Reconstructor {
    fn link_nodes(&mut self) -> Result<TreeNode> {
        let record = &self.records[self.cursor];
        let flag = record.flag;
        let mut node = TreeNode::leaf(record.value, record.frequency);
        match flag {
            ChildFlag::Neither => {}
            ChildFlag::RightOnly => {
                node.right = Some(Box::new(self.next_child()?));
            }
            ChildFlag::LeftOnly => {
                node.left = Some(Box::new(self.next_child()?));
            }
            ChildFlag::Both => {
                node.left = Some(Box::new(self.next_child()?));
                node.right = Some(Box::new(self.next_child()?));
            }
        }
        Ok(node)
    }

    fn next_child(&mut self) -> Result<TreeNode> {
        self.cursor += 1;
        if self.cursor >= self.records.len() {
            return Err(Error::invalid_input(
                "tree packet ends before all children were read",
            ));
        }
        self.link_nodes()
    }
}

/// Rebuilds a tree from a packet made by [`tree_packet`]. The first record
/// is the root.
pub fn tree_reconstructor(packet: &[u8]) -> Result<HuffmanTree> {
    if packet.is_empty() || packet.len() % RECORD_LEN != 0 {
        return Err(Error::invalid_input(format!(
            "invalid tree packet size {}",
            packet.len()
        )));
    }
    if packet.len() / RECORD_LEN > MAX_NODES {
        return Err(Error::invalid_input(format!(
            "tree packet holds {} nodes, at most {MAX_NODES} are possible",
            packet.len() / RECORD_LEN
        )));
    }

    let records = packet
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let frequency = Weight::try_from(bytes_to_int(&chunk[1..5])?)
                .map_err(|_| Error::invalid_input("negative frequency in tree packet"))?;
            Ok(Record {
                value: chunk[0],
                frequency,
                flag: ChildFlag::from_byte(chunk[5])?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut reconstructor = Reconstructor { records, cursor: 0 };
    let root = reconstructor.link_nodes()?;
    let used = reconstructor.cursor + 1;
    if used != reconstructor.records.len() {
        return Err(Error::invalid_input(format!(
            "tree packet has {} records but the tree only uses {used}",
            reconstructor.records.len()
        )));
    }
    Ok(HuffmanTree::from_root(root))
}
