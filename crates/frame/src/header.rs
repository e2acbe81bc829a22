use crate::error::{ErrorKind, Result};
use crate::{ColorFormat, HEADER_SIZE, MAGIC};

/// Decoded frame header (everything except the magic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub color_format: u32,
    pub flags: u32,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
}

impl FrameHeader {
    /// Number of payload bytes that follow the header (`height * stride`).
    ///
    /// Computed in 64 bits so that a hostile header can't overflow.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> u64 {
        u64::from(self.height) * u64::from(self.stride)
    }

    /// Header plus payload.
    #[inline]
    #[must_use]
    pub fn frame_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.payload_len()
    }

    #[must_use]
    pub fn format(&self) -> ColorFormat {
        ColorFormat::from_raw(self.color_format)
    }

    /// Serialize the header, magic included.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let fields = [MAGIC, self.color_format, self.flags, self.width, self.height, self.stride];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_le_bytes());
        }
        out
    }
}

/// Decode a frame header from the start of `bytes`.
///
/// # Errors
/// - [`Truncated`](ErrorKind::Truncated) when fewer than
///   [`HEADER_SIZE`] bytes are available.
/// - [`BadMagic`](ErrorKind::BadMagic) when the first field isn't
///   [`MAGIC`].
///
/// # Examples
///
/// ```
/// use emote_frame::{decode_header, error::ErrorKind};
///
/// let err = decode_header(&[0u8; 10]).unwrap_err();
/// assert!(matches!(&*err, ErrorKind::Truncated { .. }));
/// ```
pub fn decode_header(bytes: &[u8]) -> Result<FrameHeader> {
    let Some(raw) = bytes.first_chunk::<HEADER_SIZE>() else {
        exn::bail!(ErrorKind::Truncated {
            needed: HEADER_SIZE as u64,
            available: bytes.len() as u64,
        });
    };
    let field = |index: usize| {
        let start = index * 4;
        u32::from_le_bytes([raw[start], raw[start + 1], raw[start + 2], raw[start + 3]])
    };
    let magic = field(0);
    if magic != MAGIC {
        exn::bail!(ErrorKind::BadMagic(magic));
    }
    Ok(FrameHeader {
        color_format: field(1),
        flags: field(2),
        width: field(3),
        height: field(4),
        stride: field(5),
    })
}
