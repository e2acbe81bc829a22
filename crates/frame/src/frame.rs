use crate::error::{ErrorKind, Result};
use crate::{ColorFormat, FrameHeader, HEADER_SIZE, decode_header};

/// A single decoded image: header fields plus raw pixel bytes.
///
/// `pixel_data.len() == height * stride` always holds; [`Frame::new`] is the
/// only way to build one from parts.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    pixel_data: Vec<u8>,
}

impl Frame {
    /// Build a frame, checking the payload length against the header.
    pub fn new(header: FrameHeader, pixel_data: Vec<u8>) -> Result<Self> {
        let expected = header.payload_len();
        let actual = pixel_data.len() as u64;
        if expected != actual {
            exn::bail!(ErrorKind::PayloadMismatch { expected, actual });
        }
        Ok(Self { header, pixel_data })
    }

    pub fn header(&self) -> &FrameHeader {
        &self.header
    }

    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn stride(&self) -> u32 {
        self.header.stride
    }

    pub fn color_format(&self) -> ColorFormat {
        self.header.format()
    }

    pub fn flags(&self) -> u32 {
        self.header.flags
    }

    pub fn pixel_data(&self) -> &[u8] {
        &self.pixel_data
    }

    pub fn into_pixel_data(self) -> Vec<u8> {
        self.pixel_data
    }

    /// Encoded size in bytes (header plus payload).
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.pixel_data.len()
    }
}

// Pixel data is far too long to be useful in debug output.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.header.width)
            .field("height", &self.header.height)
            .field("stride", &self.header.stride)
            .field("color_format", &self.color_format())
            .field("flags", &self.header.flags)
            .field("pixel_bytes", &self.pixel_data.len())
            .finish()
    }
}

/// Decode the payload that follows an already-decoded `header`.
///
/// `bytes` starts immediately after the header. Bytes beyond the payload
/// are not consumed.
///
/// # Errors
/// [`Truncated`](ErrorKind::Truncated) if fewer than `height * stride`
/// bytes remain.
pub fn decode_frame(bytes: &[u8], header: FrameHeader) -> Result<Frame> {
    let needed = header.payload_len();
    let available = bytes.len() as u64;
    if available < needed {
        exn::bail!(ErrorKind::Truncated { needed, available });
    }
    // `needed <= bytes.len()`, so it fits in a usize.
    let payload = &bytes[..needed as usize];
    Ok(Frame {
        header,
        pixel_data: payload.to_vec(),
    })
}

/// Decode one complete frame from the start of `bytes`.
///
/// Returns the frame and the number of bytes it occupied, so callers can
/// walk a bundle.
///
/// # Examples
///
/// ```
/// use emote_frame::{Frame, FrameHeader, decode, encode_frame};
///
/// let header = FrameHeader { color_format: 0x12, flags: 0, width: 2, height: 2, stride: 4 };
/// let frame = Frame::new(header, vec![7; 8]).unwrap();
/// let bytes = encode_frame(&frame);
/// let (decoded, consumed) = decode(&bytes).unwrap();
/// assert_eq!(decoded, frame);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn decode(bytes: &[u8]) -> Result<(Frame, usize)> {
    let header = decode_header(bytes)?;
    let frame = decode_frame(&bytes[HEADER_SIZE..], header)?;
    let consumed = frame.encoded_len();
    Ok((frame, consumed))
}

/// Encode a frame: header fields followed by the raw payload.
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.encoded_len());
    out.extend_from_slice(&frame.header.to_bytes());
    out.extend_from_slice(&frame.pixel_data);
    out
}
