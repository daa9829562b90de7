use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bitvec::prelude::{BitSlice, BitVec, Msb0};

use crate::error::{Error, Result};
use crate::tree::{HuffmanTree, TreeNode};

/// Only use this bit order throughout this crate: the first bit of a code
/// lands in the most significant bit of a packed byte.
pub type Bits = BitVec<u8, Msb0>;

/// A newtype wrapper around bitvec holding one Huffman code,
/// false is a step to the left child and true a step to the right.
#[derive(Eq, PartialEq, Clone, Default, Hash)]
pub struct Code {
    inner: Bits,
}

impl Code {
    pub fn new() -> Code {
        Code { inner: Bits::new() }
    }

    pub fn push(&mut self, bit: bool) {
        self.inner.push(bit);
    }

    pub fn pop(&mut self) -> Option<bool> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn as_bitslice(&self) -> &BitSlice<u8, Msb0> {
        &self.inner
    }

    pub fn starts_with(&self, other: &Code) -> bool {
        self.inner.starts_with(other.inner.as_bitslice())
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for bit in self.inner.iter().by_vals() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Code({self})")
    }
}

impl FromStr for Code {
    type Err = Error;

    fn from_str(s: &str) -> Result<Code> {
        let mut code = Code::new();
        for symbol in s.chars() {
            match symbol {
                '0' => code.push(false),
                '1' => code.push(true),
                other => {
                    return Err(Error::invalid_input(format!(
                        "invalid bit {other:?} in code {s:?}"
                    )))
                }
            }
        }
        Ok(code)
    }
}

/// byte value -> code, in ascending byte order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeTable {
    codes: BTreeMap<u8, Code>,
}

impl CodeTable {
    /// Walks every root-to-leaf path, left before right.
    pub fn from_tree(tree: &HuffmanTree) -> CodeTable {
        let mut table = CodeTable::default();
        let mut path = Code::new();
        table.find_paths(tree.root(), &mut path);
        table
    }

    fn find_paths(&mut self, node: &TreeNode, path: &mut Code) {
        if node.is_leaf() {
            self.codes.insert(node.value, path.clone());
            return;
        }
        if let Some(left) = node.left.as_deref() {
            path.push(false);
            self.find_paths(left, path);
            path.pop();
        }
        if let Some(right) = node.right.as_deref() {
            path.push(true);
            self.find_paths(right, path);
            path.pop();
        }
    }

    pub fn get(&self, byte: u8) -> Option<&Code> {
        self.codes.get(&byte)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &Code)> + '_ {
        self.codes.iter().map(|(&byte, code)| (byte, code))
    }

    /// true when no code is a prefix of a different code
    pub fn is_prefix_free(&self) -> bool {
        self.codes.iter().all(|(a, code_a)| {
            self.codes
                .iter()
                .all(|(b, code_b)| a == b || !code_b.starts_with(code_a))
        })
    }
}
