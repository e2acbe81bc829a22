//! Structural validation of frame bundles.
//!
//! A bundle carries no frame count of its own, so callers supply the frame
//! counts they expect (one per animation, in bundle order). Validation walks
//! the bundle header by header without decoding pixel data:
//!
//! 1. a partial header, or a payload running past the end of the bundle, is
//!    [`Truncated`](ErrorKind::Truncated);
//! 2. a header with the wrong magic is [`BadMagic`](ErrorKind::BadMagic);
//! 3. once the bundle ends cleanly on a frame boundary, the number of frames
//!    walked must equal the sum of the expected counts, otherwise
//!    [`CountMismatch`](ErrorKind::CountMismatch).
//!
//! The first violation wins.

pub mod error;

use self::error::{ErrorKind, Result};
use crate::error::ErrorKind as FormatErrorKind;
use crate::{HEADER_SIZE, decode_header};
use exn::ResultExt;
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Validate an in-memory bundle.
///
/// Returns the number of frames validated.
///
/// # Examples
///
/// ```
/// use emote_frame::bundle::{validate_bundle, error::ErrorKind};
/// use emote_frame::{Frame, FrameHeader, encode_frame};
///
/// let header = FrameHeader { color_format: 0x12, flags: 0, width: 2, height: 2, stride: 4 };
/// let frame = encode_frame(&Frame::new(header, vec![0; 8]).unwrap());
/// let bundle = [frame.as_slice(), frame.as_slice(), frame.as_slice()].concat();
///
/// assert_eq!(validate_bundle(&bundle, &[2, 1]).unwrap(), 3);
/// let err = validate_bundle(&bundle, &[4]).unwrap_err();
/// assert_eq!(*err, ErrorKind::CountMismatch(4, 3));
/// ```
pub fn validate_bundle(bytes: &[u8], expected_frame_counts: &[u32]) -> Result<u32> {
    validate_reader(Cursor::new(bytes), expected_frame_counts)
}

/// Validate a bundle from any seekable source, typically an open file.
///
/// Validation starts at the reader's current position and runs to the end
/// of the source. Payloads are skipped with a seek, so at most one header is
/// held in memory at a time regardless of bundle size.
pub fn validate_reader<R: Read + Seek>(mut reader: R, expected_frame_counts: &[u32]) -> Result<u32> {
    let expected: u64 = expected_frame_counts.iter().map(|count| u64::from(*count)).sum();
    let mut offset = reader.stream_position().or_raise(|| ErrorKind::Io)?;
    let end = reader.seek(SeekFrom::End(0)).or_raise(|| ErrorKind::Io)?;
    reader.seek(SeekFrom::Start(offset)).or_raise(|| ErrorKind::Io)?;

    let mut index: u32 = 0;
    let mut header = [0u8; HEADER_SIZE];
    while offset < end {
        let remaining = end - offset;
        if remaining < HEADER_SIZE as u64 {
            tracing::debug!(frame = index, offset, remaining, "Bundle ends inside a frame header");
            exn::bail!(ErrorKind::Truncated(index));
        }
        reader.read_exact(&mut header).or_raise(|| ErrorKind::Io)?;
        let decoded = match decode_header(&header) {
            Ok(decoded) => decoded,
            Err(err) => {
                let kind = match &*err {
                    FormatErrorKind::BadMagic(_) => ErrorKind::BadMagic(index),
                    _ => ErrorKind::Truncated(index),
                };
                return Err(err.raise(kind));
            },
        };
        let payload = decoded.payload_len();
        if payload > remaining - HEADER_SIZE as u64 {
            tracing::debug!(frame = index, offset, payload, remaining, "Frame payload runs past end of bundle");
            exn::bail!(ErrorKind::Truncated(index));
        }
        offset += decoded.frame_len();
        reader.seek(SeekFrom::Start(offset)).or_raise(|| ErrorKind::Io)?;
        tracing::trace!(
            frame = index,
            width = decoded.width,
            height = decoded.height,
            format = %decoded.format(),
            "Frame header valid"
        );
        index += 1;
    }

    if u64::from(index) != expected {
        exn::bail!(ErrorKind::CountMismatch(expected, index));
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, FrameHeader, encode_frame};
    use rstest::rstest;
    use std::io::Cursor;

    // Frame counts of the device's full animation set, in bundle order.
    const MEGA_LAYOUT: [u32; 8] = [3, 3, 4, 4, 4, 4, 2, 4];

    fn frame_bytes(seed: u8) -> Vec<u8> {
        let header = FrameHeader {
            color_format: 0x12,
            flags: 0,
            width: 4,
            height: 3,
            stride: 8,
        };
        encode_frame(&Frame::new(header, vec![seed; 24]).unwrap())
    }

    fn bundle(frames: u32) -> Vec<u8> {
        (0..frames).flat_map(|i| frame_bytes(i as u8)).collect()
    }

    #[test]
    fn test_valid_bundle() {
        let bytes = bundle(28);
        assert_eq!(validate_bundle(&bytes, &MEGA_LAYOUT).unwrap(), 28);
    }

    #[test]
    fn test_missing_frame_is_count_mismatch() {
        let bytes = bundle(27);
        let err = validate_bundle(&bytes, &MEGA_LAYOUT).unwrap_err();
        assert_eq!(*err, ErrorKind::CountMismatch(28, 27));
    }

    #[test]
    fn test_extra_frame_is_count_mismatch() {
        let bytes = bundle(29);
        let err = validate_bundle(&bytes, &MEGA_LAYOUT).unwrap_err();
        assert_eq!(*err, ErrorKind::CountMismatch(28, 29));
    }

    #[test]
    fn test_empty_bundle() {
        assert_eq!(validate_bundle(&[], &[]).unwrap(), 0);
        let err = validate_bundle(&[], &[1]).unwrap_err();
        assert_eq!(*err, ErrorKind::CountMismatch(1, 0));
    }

    #[test]
    fn test_huge_expected_counts_do_not_overflow() {
        let err = validate_bundle(&bundle(2), &[u32::MAX, 1]).unwrap_err();
        assert_eq!(*err, ErrorKind::CountMismatch(u64::from(u32::MAX) + 1, 2));
    }

    #[test]
    fn test_one_byte_short_is_truncated() {
        let bytes = bundle(28);
        let err = validate_bundle(&bytes[..bytes.len() - 1], &MEGA_LAYOUT).unwrap_err();
        assert_eq!(*err, ErrorKind::Truncated(27));
    }

    #[test]
    fn test_every_cut_inside_a_frame_is_truncated() {
        let bytes = bundle(3);
        let frame_len = frame_bytes(0).len();
        for cut in 0..bytes.len() {
            let result = validate_bundle(&bytes[..cut], &[3]);
            let err = result.unwrap_err();
            if cut % frame_len == 0 {
                assert_eq!(*err, ErrorKind::CountMismatch(3, (cut / frame_len) as u32), "cut at {cut}");
            } else {
                assert_eq!(*err, ErrorKind::Truncated((cut / frame_len) as u32), "cut at {cut}");
            }
        }
    }

    #[rstest]
    #[case(0)]
    #[case(5)]
    #[case(27)]
    fn test_bad_magic_reports_frame(#[case] corrupt: usize) {
        let mut bytes = bundle(28);
        let frame_len = frame_bytes(0).len();
        bytes[corrupt * frame_len] ^= 0xFF;
        let err = validate_bundle(&bytes, &MEGA_LAYOUT).unwrap_err();
        assert_eq!(*err, ErrorKind::BadMagic(corrupt as u32));
    }

    #[test]
    fn test_oversized_payload_is_truncated() {
        let mut bytes = bundle(2);
        // Claim a huge height on the second frame.
        let frame_len = frame_bytes(0).len();
        bytes[frame_len + 16..frame_len + 20].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = validate_bundle(&bytes, &[2]).unwrap_err();
        assert_eq!(*err, ErrorKind::Truncated(1));
    }

    #[test]
    fn test_reader_starts_at_current_position() {
        let mut bytes = b"junk".to_vec();
        bytes.extend(bundle(4));
        let mut cursor = Cursor::new(bytes);
        cursor.set_position(4);
        assert_eq!(validate_reader(cursor, &[4]).unwrap(), 4);
    }

    /// Reader that refuses to read more than one header's worth at a time.
    struct HeaderOnly(Cursor<Vec<u8>>);

    impl Read for HeaderOnly {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            assert!(buf.len() <= HEADER_SIZE, "validator read {} bytes at once", buf.len());
            self.0.read(buf)
        }
    }

    impl Seek for HeaderOnly {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.0.seek(pos)
        }
    }

    #[test]
    fn test_reader_never_reads_payloads() {
        let reader = HeaderOnly(Cursor::new(bundle(28)));
        assert_eq!(validate_reader(reader, &MEGA_LAYOUT).unwrap(), 28);
    }
}
