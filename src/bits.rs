use std::io::{BufRead, ErrorKind, Write};

use bitvec::prelude::Msb0;
use bitvec::view::BitView;
use log::debug;

use crate::code::{Bits, Code, CodeTable};
use crate::counter::FrequencyTable;
use crate::error::{Error, Result};
use crate::tree::{HuffmanTree, TreeNode};

/// Number of bits the payload for `frequencies` takes before padding.
///
/// Both tables are walked in ascending byte order side by side, so they
/// must cover exactly the same bytes.
pub fn total_bits(frequencies: &FrequencyTable, codes: &CodeTable) -> Result<u128> {
    if frequencies.len() != codes.len() {
        return Err(Error::invalid_input(format!(
            "{} counted bytes but {} codes",
            frequencies.len(),
            codes.len()
        )));
    }
    let mut total: u128 = 0;
    for ((&byte, &count), (coded, code)) in frequencies.iter().zip(codes.iter()) {
        if byte != coded {
            return Err(Error::invalid_input(format!(
                "byte {byte:#04x} has no code"
            )));
        }
        total += u128::from(count) * code.len() as u128;
    }
    Ok(total)
}

/// Zero bits needed to fill out the last payload byte, always in 0..8.
pub fn padding_bits(frequencies: &FrequencyTable, codes: &CodeTable) -> Result<u8> {
    let total = total_bits(frequencies, codes)?;
    Ok(((8 - total % 8) % 8) as u8)
}

/// Packs codes into bytes, first bit in the most significant position.
pub struct BitPacker<W: Write> {
    out: W,
    buffer: Bits,
    bytes_written: u64,
}

impl<W: Write> BitPacker<W> {
    pub fn new(out: W) -> BitPacker<W> {
        BitPacker {
            out,
            buffer: Bits::with_capacity(64),
            bytes_written: 0,
        }
    }

    /// Appends a code and writes out every byte it completes.
    pub fn push(&mut self, code: &Code) -> Result<()> {
        self.buffer.extend_from_bitslice(code.as_bitslice());
        if self.buffer.len() >= 8 {
            // split off incomplete byte from buffer
            let split_index = self.buffer.len() - self.buffer.len() % 8;
            let remainder = self.buffer.split_off(split_index);
            self.out.write_all(self.buffer.as_raw_slice())?;
            self.bytes_written += (split_index / 8) as u64;
            self.buffer = remainder;
        }
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Pads the unfinished byte with `padding` zero bits, writes it and
    /// flushes. `padding` has to be exactly what completes the byte.
    pub fn finish(mut self, padding: u8) -> Result<W> {
        let pending = self.buffer.len();
        let expected = (8 - pending % 8) % 8;
        if usize::from(padding) != expected {
            return Err(Error::invalid_input(format!(
                "{pending} bits left over cannot be padded with {padding} bits"
            )));
        }
        if pending > 0 {
            self.buffer.resize(8, false);
            self.out.write_all(self.buffer.as_raw_slice())?;
            self.bytes_written += 1;
        }
        self.out.flush()?;
        debug!(
            "packed {} bytes with {padding} padding bits",
            self.bytes_written
        );
        Ok(self.out)
    }
}

/// Walks a Huffman tree bit by bit, emitting a byte at every leaf.
pub struct BitUnpacker<'t> {
    root: &'t TreeNode,
    cursor: &'t TreeNode,
    emitted: u64,
}

impl<'t> BitUnpacker<'t> {
    pub fn new(tree: &'t HuffmanTree) -> BitUnpacker<'t> {
        BitUnpacker {
            root: tree.root(),
            cursor: tree.root(),
            emitted: 0,
        }
    }

    /// 0 descends left, 1 descends right
    fn step(&mut self, bit: bool, out: &mut impl Write) -> Result<()> {
        let next = if bit {
            self.cursor.right.as_deref()
        } else {
            self.cursor.left.as_deref()
        };
        let next = next.ok_or_else(|| {
            Error::invalid_input("corrupt payload: code leads outside the tree")
        })?;
        if next.is_leaf() {
            out.write_all(&[next.value])?;
            self.emitted += 1;
            self.cursor = self.root;
        } else {
            self.cursor = next;
        }
        Ok(())
    }

    fn feed(&mut self, byte: u8, bits: usize, out: &mut impl Write) -> Result<()> {
        for bit in byte.view_bits::<Msb0>()[..bits].iter().by_vals() {
            self.step(bit, out)?;
        }
        Ok(())
    }

    /// Decodes the whole payload in `r`, dropping the last `padding` bits
    /// of the final byte. Returns how many bytes were written to `out`.
    pub fn unpack<R: BufRead, W: Write>(
        mut self,
        mut r: R,
        mut out: W,
        padding: u8,
    ) -> Result<u64> {
        if padding > 7 {
            return Err(Error::invalid_input(format!(
                "padding of {padding} bits is more than a byte"
            )));
        }
        // hold one byte back so the last one can be trimmed
        let mut pending: Option<u8> = None;
        loop {
            let chunk = match r.fill_buf() {
                Ok(chunk) => chunk,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if chunk.is_empty() {
                break;
            }
            for &byte in chunk {
                if let Some(previous) = pending.replace(byte) {
                    self.feed(previous, 8, &mut out)?;
                }
            }
            let consumed = chunk.len();
            r.consume(consumed);
        }
        match pending {
            Some(last) => self.feed(last, 8 - usize::from(padding), &mut out)?,
            None if padding > 0 => {
                return Err(Error::invalid_input(
                    "payload is empty but the header expects padding",
                ))
            }
            None => {}
        }
        if !std::ptr::eq(self.cursor, self.root) {
            return Err(Error::invalid_input(
                "truncated payload: stream ends in the middle of a code",
            ));
        }
        out.flush()?;
        Ok(self.emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn code(s: &str) -> Code {
        s.parse().unwrap()
    }

    fn oracle_tree() -> (FrequencyTable, HuffmanTree) {
        let frequencies: FrequencyTable = [(b'A', 12), (b'B', 3), (b'C', 22), (b'D', 10)]
            .into_iter()
            .collect();
        let tree = HuffmanTree::from_frequencies(&frequencies).unwrap();
        (frequencies, tree)
    }

    #[test]
    fn padding_for_oracle_table() {
        let (frequencies, tree) = oracle_tree();
        let codes = CodeTable::from_tree(&tree);
        // 12*2 + 3*3 + 22*1 + 10*3 = 85 bits
        assert_eq!(total_bits(&frequencies, &codes).unwrap(), 85);
        assert_eq!(padding_bits(&frequencies, &codes).unwrap(), 3);
    }

    #[test]
    fn aligned_payload_needs_no_padding() {
        let frequencies: FrequencyTable = [(b'x', 8)].into_iter().collect();
        let tree = HuffmanTree::from_frequencies(&frequencies).unwrap();
        let codes = CodeTable::from_tree(&tree);
        assert_eq!(padding_bits(&frequencies, &codes).unwrap(), 0);
    }

    #[test]
    fn mismatched_tables_are_rejected() {
        let (frequencies, tree) = oracle_tree();
        let codes = CodeTable::from_tree(&tree);
        let mut other = frequencies.clone();
        other.remove(&b'A');
        other.insert(b'Z', 12);
        assert!(matches!(
            padding_bits(&other, &codes),
            Err(Error::InvalidInput { .. })
        ));
        other.remove(&b'Z');
        assert!(matches!(
            padding_bits(&other, &codes),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn packer_emits_whole_bytes_in_order() {
        let mut packer = BitPacker::new(Vec::new());
        packer.push(&code("101")).unwrap();
        packer.push(&code("1100")).unwrap();
        assert_eq!(packer.bytes_written(), 0);
        packer.push(&code("111")).unwrap();
        assert_eq!(packer.bytes_written(), 1);
        packer.push(&code("0")).unwrap();
        // 10111001 | 110 + 5 padding
        let out = packer.finish(5).unwrap();
        assert_eq!(out, vec![0b1011_1001, 0b1100_0000]);
    }

    #[test]
    fn packer_handles_codes_longer_than_a_byte() {
        let mut packer = BitPacker::new(Vec::new());
        packer.push(&code("1111000011110000101")).unwrap();
        assert_eq!(packer.bytes_written(), 2);
        let out = packer.finish(5).unwrap();
        assert_eq!(out, vec![0xF0, 0xF0, 0b1010_0000]);
    }

    #[test]
    fn packer_without_leftover_writes_no_extra_byte() {
        let mut packer = BitPacker::new(Vec::new());
        packer.push(&code("10101010")).unwrap();
        assert_eq!(packer.finish(0).unwrap(), vec![0xAA]);
    }

    #[test]
    fn packer_rejects_wrong_padding() {
        let mut packer = BitPacker::new(Vec::new());
        packer.push(&code("101")).unwrap();
        assert!(matches!(packer.finish(3), Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn unpacker_drops_padding() {
        let (_, tree) = oracle_tree();
        // C A B D = 0 10 110 111 = 01011011 1 + 7 padding
        let payload: [u8; 2] = [0b0101_1011, 0b1000_0000];
        let mut out = Vec::new();
        let emitted = BitUnpacker::new(&tree)
            .unpack(Cursor::new(payload), &mut out, 7)
            .unwrap();
        assert_eq!(emitted, 4);
        assert_eq!(out, b"CABD".to_vec());
    }

    #[test]
    fn unpacker_reads_across_buffer_refills() {
        let (_, tree) = oracle_tree();
        // C A B D C A B D = 01011011 10101101 11 + 6 padding
        let payload: [u8; 3] = [0b0101_1011, 0b1010_1101, 0b1100_0000];
        let r = BufReader::with_capacity(1, Cursor::new(payload));
        let mut out = Vec::new();
        let emitted = BitUnpacker::new(&tree).unpack(r, &mut out, 6).unwrap();
        assert_eq!(emitted, 8);
        assert_eq!(out, b"CABDCABD".to_vec());
    }

    #[test]
    fn unpacker_detects_truncation() {
        let (_, tree) = oracle_tree();
        // C A then half of B
        let payload: [u8; 1] = [0b0101_1000];
        let err = BitUnpacker::new(&tree)
            .unpack(Cursor::new(payload), Vec::new(), 3)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn unpacker_rejects_paths_off_the_tree() {
        let tree = HuffmanTree::from_leaves(vec![TreeNode::leaf(b'a', 3)]).unwrap();
        // the single-symbol root has no right child
        let err = BitUnpacker::new(&tree)
            .unpack(Cursor::new([0b0001_0000u8]), Vec::new(), 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn unpacker_rejects_bad_padding() {
        let (_, tree) = oracle_tree();
        assert!(matches!(
            BitUnpacker::new(&tree).unpack(Cursor::new([0u8]), Vec::new(), 8),
            Err(Error::InvalidInput { .. })
        ));
        assert!(matches!(
            BitUnpacker::new(&tree).unpack(Cursor::new(Vec::<u8>::new()), Vec::new(), 2),
            Err(Error::InvalidInput { .. })
        ));
    }

    #[test]
    fn single_symbol_stream() {
        let tree = HuffmanTree::from_leaves(vec![TreeNode::leaf(b'a', 3)]).unwrap();
        let codes = CodeTable::from_tree(&tree);
        let mut packer = BitPacker::new(Vec::new());
        for _ in 0..3 {
            packer.push(codes.get(b'a').unwrap()).unwrap();
        }
        let payload = packer.finish(5).unwrap();
        assert_eq!(payload, vec![0]);
        let mut out = Vec::new();
        BitUnpacker::new(&tree)
            .unpack(Cursor::new(payload), &mut out, 5)
            .unwrap();
        assert_eq!(out, b"aaa".to_vec());
    }
}
