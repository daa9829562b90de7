//! Lossless byte-stream compression with Huffman codes.
//!
//! [`encode`] reads its input twice: once to count bytes, then again (after
//! seeking back to the start) to pack the codes. The output is a
//! self-describing container, see [`container`], that [`decode`] turns back
//! into the original bytes.
//!
//! ```
//! use std::io::Cursor;
//!
//! let mut packed = Vec::new();
//! hcmp::encode(Cursor::new(b"abracadabra".to_vec()), &mut packed, b"txt")?;
//!
//! let mut unpacked = Vec::new();
//! let header = hcmp::decode(Cursor::new(packed), &mut unpacked)?;
//! assert_eq!(unpacked, b"abracadabra");
//! assert_eq!(header.extension, b"txt");
//! # Ok::<(), hcmp::Error>(())
//! ```

use std::io::{BufRead, ErrorKind, Seek, SeekFrom, Write};

use log::{debug, info};

pub mod bits;
pub mod code;
pub mod container;
pub mod counter;
mod error;
pub mod file;
pub mod packet;
pub mod tree;

pub use bits::{padding_bits, BitPacker, BitUnpacker};
pub use code::{Code, CodeTable};
pub use container::{Header, COMPRESSED_EXTENSION};
pub use counter::{count_bytes, FrequencyTable};
pub use error::{Error, Result};
pub use file::{compress_file, decompress_file, process_file, Mode};
pub use packet::{bytes_to_int, int_to_bytes, tree_packet, tree_reconstructor};
pub use tree::{HuffmanTree, TreeNode};

/// What [`encode`] did, for reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeSummary {
    /// bytes read from the input
    pub input_bytes: u64,
    /// distinct byte values in the input
    pub symbols: usize,
    /// packed payload bytes, header excluded
    pub payload_bytes: u64,
    pub padding: u8,
}

/// Compresses everything in `r` into `out`, recording the raw bytes of
/// `extension` as the original file's extension.
///
/// Fails with [`Error::InvalidInput`] on empty input, since there is no
/// symbol to build a tree from.
pub fn encode<R, W>(mut r: R, out: W, extension: &[u8]) -> Result<EncodeSummary>
where
    R: BufRead + Seek,
    W: Write,
{
    let frequencies = count_bytes(&mut r)?;
    info!("Retrieved occurrences");
    let tree = HuffmanTree::from_frequencies(&frequencies)?;
    info!("Created Huffman tree");
    let packet = tree_packet(&tree)?;
    let codes = CodeTable::from_tree(&tree);
    info!("Created table");
    drop(tree);

    let padding = padding_bits(&frequencies, &codes)?;
    let header = Header {
        padding,
        extension: extension.to_vec(),
        tree_packet: packet,
    };
    let mut out = out;
    header.write_to(&mut out)?;

    r.seek(SeekFrom::Start(0))?;
    let mut packer = BitPacker::new(out);
    let mut input_bytes: u64 = 0;
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
            let code = codes.get(byte).ok_or_else(|| {
                Error::invalid_input(format!(
                    "byte {byte:#04x} was not counted, input changed while compressing"
                ))
            })?;
            packer.push(code)?;
        }
        let consumed = chunk.len();
        input_bytes += consumed as u64;
        r.consume(consumed);
    }

    let counted: u64 = frequencies.values().sum();
    if input_bytes != counted {
        return Err(Error::invalid_input(format!(
            "counted {counted} bytes but read {input_bytes}, input changed while compressing"
        )));
    }

    let payload_bytes = packer.bytes_written();
    packer.finish(padding)?;
    // finish wrote the padded last byte, if there was one
    let payload_bytes = payload_bytes + u64::from(padding > 0);
    debug!(
        "encoded {input_bytes} bytes of {} symbols into {payload_bytes} payload bytes",
        frequencies.len()
    );
    Ok(EncodeSummary {
        input_bytes,
        symbols: frequencies.len(),
        payload_bytes,
        padding,
    })
}

/// Decompresses a whole container from `r` into `out` and returns its
/// header.
pub fn decode<R, W>(mut r: R, out: W) -> Result<Header>
where
    R: BufRead,
    W: Write,
{
    let header = Header::read_from(&mut r)?;
    decode_payload(&header, r, out)?;
    Ok(header)
}

/// Decompresses the payload that follows `header`. Returns the number of
/// bytes written.
pub fn decode_payload<R, W>(header: &Header, r: R, out: W) -> Result<u64>
where
    R: BufRead,
    W: Write,
{
    let tree = tree_reconstructor(&header.tree_packet)?;
    debug!("rebuilt tree of {} nodes", tree.node_count());
    let written = BitUnpacker::new(&tree).unpack(r, out, header.padding)?;
    debug!("decoded {written} bytes");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let mut packed = Vec::new();
        encode(Cursor::new(data.to_vec()), &mut packed, b"bin").unwrap();
        let mut unpacked = Vec::new();
        decode(Cursor::new(packed), &mut unpacked).unwrap();
        unpacked
    }

    #[test]
    fn round_trips_text() {
        let text = b"It was the best of times, it was the worst of times.\n";
        assert_eq!(round_trip(text), text.to_vec());
    }

    #[test]
    fn round_trips_every_byte_value() {
        let data: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).chain([7; 100]).collect();
        assert_eq!(round_trip(&data), data);
    }

    #[test]
    fn round_trips_single_byte() {
        assert_eq!(round_trip(b"x"), b"x".to_vec());
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = encode(Cursor::new(Vec::new()), Vec::new(), b"txt").unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[test]
    fn container_for_oracle_input() {
        // A*12 B*3 C*22 D*10, codes C=0 A=10 B=110 D=111
        let mut data = Vec::new();
        data.extend([b'A'; 12]);
        data.extend([b'B'; 3]);
        data.extend([b'C'; 22]);
        data.extend([b'D'; 10]);
        let mut packed = Vec::new();
        let summary = encode(Cursor::new(data.clone()), &mut packed, b"txt").unwrap();
        assert_eq!(
            summary,
            EncodeSummary {
                input_bytes: 47,
                symbols: 4,
                payload_bytes: 11,
                padding: 3,
            }
        );

        let mut r = Cursor::new(packed.clone());
        let header = Header::read_from(&mut r).unwrap();
        assert_eq!(header.padding, 3);
        assert_eq!(header.extension, b"txt");
        assert_eq!(header.tree_packet.len(), 7 * packet::RECORD_LEN);
        // 4 + 4 + 3 + 4 + 42 header bytes, then the payload
        assert_eq!(packed.len(), 57 + 11);
        // A A A A = 10101010
        assert_eq!(packed[57], 0b1010_1010);

        let mut unpacked = Vec::new();
        let written = decode_payload(&header, BufReader::new(r), &mut unpacked).unwrap();
        assert_eq!(written, 47);
        assert_eq!(unpacked, data);
    }

    #[test]
    fn corrupt_tree_packet_is_reported() {
        let mut packed = Vec::new();
        encode(Cursor::new(b"hello".to_vec()), &mut packed, b"").unwrap();
        // turn the root's child flag into garbage
        packed[8 + 4 + 5] = b'?';
        let err = decode(Cursor::new(packed), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }
}
