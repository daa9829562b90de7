use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::trace;

use crate::counter::FrequencyTable;
use crate::error::{Error, Result};

/// type used for node weights. The tree packet stores weights as
/// non-negative 32 bit integers, so nothing wider is ever needed.
pub type Weight = u32;

/// value carried by merge nodes, never interpreted
const MERGE_VALUE: u8 = 0;

/// A node of a Huffman tree. A node without children is a leaf standing
/// for `value`; every other node is a merge point and its `value` is
/// meaningless.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub value: u8,
    pub frequency: Weight,
    pub left: Option<Box<TreeNode>>,
    pub right: Option<Box<TreeNode>>,
}

impl TreeNode {
    pub fn leaf(value: u8, frequency: Weight) -> TreeNode {
        TreeNode {
            value,
            frequency,
            left: None,
            right: None,
        }
    }

    /// joins two subtrees under a new node weighted by their sum,
    /// `left` is reached with a 0 bit and `right` with a 1 bit
    fn merge(left: TreeNode, right: TreeNode) -> Result<TreeNode> {
        let frequency = left
            .frequency
            .checked_add(right.frequency)
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "combined frequency {} + {} does not fit in 32 bits",
                    left.frequency, right.frequency
                ))
            })?;
        Ok(TreeNode {
            value: MERGE_VALUE,
            frequency,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    /// Visits this node, then its left subtree, then its right subtree.
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }
}

/// Pre-order iterator over a tree, see [`TreeNode::pre_order`].
pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(right) = node.right.as_deref() {
            self.stack.push(right);
        }
        if let Some(left) = node.left.as_deref() {
            self.stack.push(left);
        }
        Some(node)
    }
}

/// A subtree waiting to be merged. Ordered by weight, then by the order in
/// which it joined the candidate set, so that among equal weights the one
/// that has been waiting longest is taken first.
struct Candidate {
    frequency: Weight,
    sequence: usize,
    node: TreeNode,
}

impl Candidate {
    fn new(node: TreeNode, sequence: usize) -> Candidate {
        Candidate {
            frequency: node.frequency,
            sequence,
            node,
        }
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.frequency, self.sequence).cmp(&(other.frequency, other.sequence))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// removes the two lightest candidates, lightest first
fn pop_pair(
    heap: &mut BinaryHeap<Reverse<Candidate>>,
) -> Option<(TreeNode, TreeNode)> {
    let Reverse(first) = heap.pop()?;
    let Reverse(second) = heap.pop()?;
    Some((first.node, second.node))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HuffmanTree {
    root: TreeNode,
}

impl HuffmanTree {
    /// Builds the tree for a frequency table, leaves in ascending byte
    /// order.
    pub fn from_frequencies(frequencies: &FrequencyTable) -> Result<HuffmanTree> {
        let leaves = frequencies
            .iter()
            .map(|(&byte, &count)| {
                Weight::try_from(count)
                    .map(|weight| TreeNode::leaf(byte, weight))
                    .map_err(|_| {
                        Error::invalid_input(format!(
                            "byte {byte:#04x} occurs {count} times, more than a tree packet can record"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        HuffmanTree::from_leaves(leaves)
    }

    /// Greedily merges the two lightest subtrees until one tree remains.
    ///
    /// Ties are broken in favour of whichever subtree entered the candidate
    /// set first: leaves in the order given, merged subtrees in the order
    /// they were created. The lighter (or earlier) of each pair becomes the
    /// left child.
    ///
    /// A single leaf is hung as the left child of a weight 0 root so that
    /// its code is "0" rather than empty.
    pub fn from_leaves(leaves: Vec<TreeNode>) -> Result<HuffmanTree> {
        if leaves.len() == 1 {
            let mut root = TreeNode::leaf(MERGE_VALUE, 0);
            root.left = leaves.into_iter().next().map(Box::new);
            return Ok(HuffmanTree { root });
        }

        let mut heap: BinaryHeap<Reverse<Candidate>> = leaves
            .into_iter()
            .enumerate()
            .map(|(sequence, node)| Reverse(Candidate::new(node, sequence)))
            .collect();
        let mut next_sequence = heap.len();

        while heap.len() > 2 {
            let (left, right) = pop_pair(&mut heap)
                .ok_or_else(|| Error::invalid_input("empty symbol set"))?;
            trace!("merging {} + {}", left.frequency, right.frequency);
            let merged = TreeNode::merge(left, right)?;
            heap.push(Reverse(Candidate::new(merged, next_sequence)));
            next_sequence += 1;
        }

        let (left, right) =
            pop_pair(&mut heap).ok_or_else(|| Error::invalid_input("empty symbol set"))?;
        Ok(HuffmanTree {
            root: TreeNode::merge(left, right)?,
        })
    }

    /// Wraps an existing node, e.g. one rebuilt from a tree packet.
    pub fn from_root(root: TreeNode) -> HuffmanTree {
        HuffmanTree { root }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn into_root(self) -> TreeNode {
        self.root
    }

    /// values of the leaves, left to right
    pub fn leaf_values(&self) -> Vec<u8> {
        self.root
            .pre_order()
            .filter(|node| node.is_leaf())
            .map(|node| node.value)
            .collect()
    }

    /// frequencies of every node in pre-order
    pub fn frequencies(&self) -> Vec<Weight> {
        self.root.pre_order().map(|node| node.frequency).collect()
    }

    pub fn node_count(&self) -> usize {
        self.root.pre_order().count()
    }
}
