use std::collections::BTreeMap;
use std::io::{BufRead, ErrorKind};

use crate::error::Result;

/// type used to count occurrences of a byte
/// u64 so that no realistic input can overflow it
pub type Count = u64;

/// byte value -> number of occurrences.
/// A BTreeMap so iteration is always in ascending byte order, which
/// `bits::padding_bits` relies on when it zips this against a `CodeTable`.
pub type FrequencyTable = BTreeMap<u8, Count>;

/// Reads `r` to the end and counts every byte.
///
/// The reader is left at EOF; callers that need the data again must seek
/// back to the start themselves.
pub fn count_bytes(r: &mut impl BufRead) -> Result<FrequencyTable> {
    let mut counts = [0 as Count; 256];
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
            counts[byte as usize] += 1;
        }
        let consumed = chunk.len();
        r.consume(consumed);
    }
    Ok(counts
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > 0)
        .map(|(byte, &count)| (byte as u8, count))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    #[test]
    fn counts_every_byte() {
        let mut r = Cursor::new(b"abracadabra".to_vec());
        let table = count_bytes(&mut r).unwrap();
        let expected: FrequencyTable =
            [(b'a', 5), (b'b', 2), (b'c', 1), (b'd', 1), (b'r', 2)]
                .into_iter()
                .collect();
        assert_eq!(table, expected);
    }

    #[test]
    fn iterates_in_byte_order() {
        let mut r = Cursor::new(vec![0xff, 0x00, 0x7f, 0x00, 0xff, 0x10]);
        let table = count_bytes(&mut r).unwrap();
        let keys: Vec<u8> = table.keys().copied().collect();
        assert_eq!(keys, vec![0x00, 0x10, 0x7f, 0xff]);
    }

    #[test]
    fn spans_buffer_boundaries() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 7) as u8).collect();
        // tiny buffer forces many fill_buf calls
        let mut r = BufReader::with_capacity(3, Cursor::new(data));
        let table = count_bytes(&mut r).unwrap();
        assert_eq!(table.len(), 7);
        assert_eq!(table.values().sum::<Count>(), 10_000);
        assert_eq!(table[&0], 1429);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let mut r = Cursor::new(Vec::new());
        assert!(count_bytes(&mut r).unwrap().is_empty());
    }
}
