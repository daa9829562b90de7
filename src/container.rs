//! The `.hcmp` file layout. Every integer is 4 bytes, big-endian:
//!
//! ```text
//! padding bits
//! extension length, extension bytes (original extension, no dot)
//! tree packet length, tree packet
//! payload until end of file
//! ```

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::packet::{bytes_to_int, int_to_bytes, MAX_NODES, RECORD_LEN};

/// Extension that marks a compressed file.
pub const COMPRESSED_EXTENSION: &str = "hcmp";

/// longest extension a header may carry, the usual file name limit
const MAX_EXTENSION_LEN: usize = 255;

/// Everything in front of the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// zero bits at the end of the last payload byte
    pub padding: u8,
    /// raw bytes of the original file's extension, without the dot
    pub extension: Vec<u8>,
    /// the serialized Huffman tree
    pub tree_packet: Vec<u8>,
}

fn write_int(w: &mut impl Write, num: usize) -> Result<()> {
    let num = i64::try_from(num)
        .map_err(|_| Error::invalid_input(format!("{num} is too large for a header field")))?;
    w.write_all(&int_to_bytes(num)?)?;
    Ok(())
}

fn read_int(r: &mut impl Read) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    bytes_to_int(&buf)
}

/// The extension ends up in an output file name, so it must not be able to
/// name another directory.
fn check_extension(extension: &[u8]) -> Result<()> {
    match extension.iter().find(|&&b| matches!(b, b'/' | b'\\' | b'.' | 0)) {
        Some(&b) => Err(Error::invalid_input(format!(
            "stored extension contains {b:#04x}, which cannot be part of an extension"
        ))),
        None => Ok(()),
    }
}

/// reads a length field and checks it against `max`
fn read_len(r: &mut impl Read, what: &str, max: usize) -> Result<usize> {
    let len = read_int(r)?;
    match usize::try_from(len) {
        Ok(len) if len <= max => Ok(len),
        _ => Err(Error::invalid_input(format!(
            "{what} length {len} is outside 0..={max}"
        ))),
    }
}

impl Header {
    pub fn write_to(&self, w: &mut impl Write) -> Result<()> {
        if self.padding > 7 {
            return Err(Error::invalid_input(format!(
                "padding of {} bits is more than a byte",
                self.padding
            )));
        }
        check_extension(&self.extension)?;
        write_int(w, usize::from(self.padding))?;
        write_int(w, self.extension.len())?;
        w.write_all(&self.extension)?;
        write_int(w, self.tree_packet.len())?;
        w.write_all(&self.tree_packet)?;
        Ok(())
    }

    /// Reads a header, leaving `r` at the first payload byte.
    pub fn read_from(r: &mut impl Read) -> Result<Header> {
        let padding = read_len(r, "padding", 7)? as u8;

        let extension_len = read_len(r, "extension", MAX_EXTENSION_LEN)?;
        let mut extension = vec![0u8; extension_len];
        r.read_exact(&mut extension)?;
        check_extension(&extension)?;

        let tree_len = read_len(r, "tree packet", MAX_NODES * RECORD_LEN)?;
        let mut tree_packet = vec![0u8; tree_len];
        r.read_exact(&mut tree_packet)?;

        Ok(Header {
            padding,
            extension,
            tree_packet,
        })
    }
}
