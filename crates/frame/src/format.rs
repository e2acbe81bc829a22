use std::fmt::{Display, Formatter, Result as FmtResult};

/// Pixel colour format stored in a frame header.
///
/// The codec never interprets pixel data, so formats it doesn't recognise
/// are kept verbatim as [`Other`](Self::Other) and round-trip unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFormat {
    L8,
    I1,
    I2,
    I4,
    I8,
    A1,
    A2,
    A4,
    A8,
    Rgb888,
    Argb8888,
    Xrgb8888,
    Rgb565,
    Argb8565,
    Rgb565A8,
    Other(u32),
}

impl ColorFormat {
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0x06 => Self::L8,
            0x07 => Self::I1,
            0x08 => Self::I2,
            0x09 => Self::I4,
            0x0A => Self::I8,
            0x0B => Self::A1,
            0x0C => Self::A2,
            0x0D => Self::A4,
            0x0E => Self::A8,
            0x0F => Self::Rgb888,
            0x10 => Self::Argb8888,
            0x11 => Self::Xrgb8888,
            0x12 => Self::Rgb565,
            0x13 => Self::Argb8565,
            0x14 => Self::Rgb565A8,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn raw(&self) -> u32 {
        match self {
            Self::L8 => 0x06,
            Self::I1 => 0x07,
            Self::I2 => 0x08,
            Self::I4 => 0x09,
            Self::I8 => 0x0A,
            Self::A1 => 0x0B,
            Self::A2 => 0x0C,
            Self::A4 => 0x0D,
            Self::A8 => 0x0E,
            Self::Rgb888 => 0x0F,
            Self::Argb8888 => 0x10,
            Self::Xrgb8888 => 0x11,
            Self::Rgb565 => 0x12,
            Self::Argb8565 => 0x13,
            Self::Rgb565A8 => 0x14,
            Self::Other(raw) => *raw,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L8 => "L8",
            Self::I1 => "I1",
            Self::I2 => "I2",
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A4 => "A4",
            Self::A8 => "A8",
            Self::Rgb888 => "RGB888",
            Self::Argb8888 => "ARGB8888",
            Self::Xrgb8888 => "XRGB8888",
            Self::Rgb565 => "RGB565",
            Self::Argb8565 => "ARGB8565",
            Self::Rgb565A8 => "RGB565A8",
            Self::Other(_) => "unknown",
        }
    }
}

impl Display for ColorFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Other(raw) => write!(f, "unknown({raw:#x})"),
            known => f.write_str(known.as_str()),
        }
    }
}

impl From<u32> for ColorFormat {
    fn from(raw: u32) -> Self {
        Self::from_raw(raw)
    }
}
