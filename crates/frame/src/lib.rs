//! Binary frame format for animation assets.
//!
//! A frame is a fixed 24-byte header followed by raw pixel data:
//!
//! ```text
//! Header (24 bytes, six little-endian u32):
//!   magic         0x4C56474C ("LVGL" read as a little-endian u32)
//!   color_format
//!   flags
//!   width
//!   height
//!   stride        bytes per row
//!
//! Payload (height * stride bytes)
//! ```
//!
//! Bundles are frames concatenated back to back with no separators and no
//! frame count; see [`bundle`] for structural validation.

pub mod bundle;
pub mod error;
mod format;
mod frame;
mod header;

pub use crate::format::ColorFormat;
pub use crate::frame::{Frame, decode, decode_frame, encode_frame};
pub use crate::header::{FrameHeader, decode_header};

/// Magic value that opens every frame header.
pub const MAGIC: u32 = 0x4C56474C;
/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 24;
