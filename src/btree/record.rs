//! Record encoding inside a leaf slot.
//!
//! A leaf slot's 8-byte rid either *is* the record or points at it. Four
//! mutually exclusive states, discriminated by the slot flags byte:
//!
//! - **empty** (`size == 0`): flag `RECORD_EMPTY`, rid ignored
//! - **tiny** (`0 < size < 8`): flag `RECORD_TINY`, data in rid bytes
//!   `[0..size)`, size in rid byte 7
//! - **small** (`size == 8`): flag `RECORD_SMALL`, rid holds the bytes
//! - **blob** (`size > 8`): no size flag, rid is a blob offset
//!
//! Internal-node slots never carry record flags; their rid is always a
//! child offset.

pub(crate) const RECORD_TINY: u8 = 0x01;
pub(crate) const RECORD_SMALL: u8 = 0x02;
pub(crate) const RECORD_EMPTY: u8 = 0x04;

pub(crate) const RECORD_FLAG_MASK: u8 = RECORD_TINY | RECORD_SMALL | RECORD_EMPTY;

/// The rid width; records up to this size are stored inline.
pub(crate) const INLINE_MAX: usize = 8;

/// Decoded view of a leaf slot's record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordEncoding {
    Empty,
    Tiny(usize),
    Small,
    Blob(u64),
}

pub(crate) fn decode(flags: u8, rid: [u8; 8]) -> RecordEncoding {
    if flags & RECORD_EMPTY != 0 {
        RecordEncoding::Empty
    } else if flags & RECORD_TINY != 0 {
        RecordEncoding::Tiny(rid[7] as usize)
    } else if flags & RECORD_SMALL != 0 {
        RecordEncoding::Small
    } else {
        RecordEncoding::Blob(u64::from_le_bytes(rid))
    }
}

/// Encodes a record of at most [`INLINE_MAX`] bytes into (rid, flags).
pub(crate) fn encode_inline(record: &[u8]) -> ([u8; 8], u8) {
    debug_assert!(record.len() <= INLINE_MAX, "inline record too large");
    let mut rid = [0u8; 8];
    match record.len() {
        0 => (rid, RECORD_EMPTY),
        INLINE_MAX => {
            rid.copy_from_slice(record);
            (rid, RECORD_SMALL)
        }
        len => {
            rid[..len].copy_from_slice(record);
            rid[7] = len as u8;
            (rid, RECORD_TINY)
        }
    }
}

/// The inline payload of a non-blob encoding.
pub(crate) fn inline_bytes(rid: &[u8; 8], encoding: RecordEncoding) -> &[u8] {
    match encoding {
        RecordEncoding::Empty => &[],
        RecordEncoding::Tiny(len) => &rid[..len.min(7)],
        RecordEncoding::Small => &rid[..],
        RecordEncoding::Blob(_) => unreachable!("blob records have no inline bytes"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_record() {
        let (rid, flags) = encode_inline(b"");
        assert_eq!(flags, RECORD_EMPTY);
        assert_eq!(decode(flags, rid), RecordEncoding::Empty);
        assert_eq!(inline_bytes(&rid, RecordEncoding::Empty), b"");
    }

    #[test]
    fn tiny_record_keeps_size_in_high_byte() {
        for len in 1..8usize {
            let data: Vec<u8> = (0..len as u8).map(|b| b + 1).collect();
            let (rid, flags) = encode_inline(&data);

            assert_eq!(flags, RECORD_TINY, "len {}", len);
            assert_eq!(rid[7], len as u8);

            let enc = decode(flags, rid);
            assert_eq!(enc, RecordEncoding::Tiny(len));
            assert_eq!(inline_bytes(&rid, enc), &data[..]);
        }
    }

    #[test]
    fn small_record_fills_the_rid() {
        let data = *b"8bytes!!";
        let (rid, flags) = encode_inline(&data);

        assert_eq!(flags, RECORD_SMALL);
        assert_eq!(rid, data);
        let enc = decode(flags, rid);
        assert_eq!(enc, RecordEncoding::Small);
        assert_eq!(inline_bytes(&rid, enc), &data);
    }

    #[test]
    fn no_size_flag_means_blob_offset() {
        let rid = 0x1234_5678_9ABC_DEF0u64.to_le_bytes();
        assert_eq!(decode(0, rid), RecordEncoding::Blob(0x1234_5678_9ABC_DEF0));
    }

    #[test]
    fn encodings_are_mutually_exclusive() {
        // a tiny record of 7 bytes whose last byte happens to be 7 must
        // still decode as tiny, not as small or blob
        let data = [9, 9, 9, 9, 9, 9, 7];
        let (rid, flags) = encode_inline(&data);
        assert_eq!(decode(flags, rid), RecordEncoding::Tiny(7));
    }
}
