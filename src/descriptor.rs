#[cfg(feature = "std")]
use std::io::{Read, Write};

use crate::error::DecodeError;

pub(crate) const MAGIC: [u8; 3] = *b"rpk";
pub(crate) const HEADER_SIZE: usize = 13;
pub(crate) const FOOTER: [u8; 8] = [0, 0, 0, 0, 0, 0, 0, 1];

/// Number of color channels carried on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channels {
    Rgb = 3,
    Rgba = 4,
}

impl Channels {
    #[inline(always)]
    pub const fn count(self) -> usize {
        match self {
            Channels::Rgb => 3,
            Channels::Rgba => 4,
        }
    }

    #[inline(always)]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Channels::Rgba)
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            3 => Some(Channels::Rgb),
            4 => Some(Channels::Rgba),
            _ => None,
        }
    }
}

/// The fixed 13-byte container header: magic, dimensions, channel count,
/// and a colorspace byte that this crate never interprets — it is produced
/// as `0` and passed through verbatim on decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: u8,
}

impl Descriptor {
    /// `sRGB with linear alpha`, the only colorspace byte this crate
    /// produces. Decoders must still pass arbitrary values through.
    pub const SRGB_LINEAR_ALPHA: u8 = 0;

    pub fn new(width: u32, height: u32, channels: Channels) -> Self {
        Descriptor { width, height, channels, colorspace: Self::SRGB_LINEAR_ALPHA }
    }

    #[inline]
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    #[cfg(feature = "std")]
    pub(crate) fn write_header<W: Write>(&self, w: &mut W) -> Result<(), crate::error::EncodeError> {
        let mut header = [0u8; HEADER_SIZE];
        header[0..3].copy_from_slice(&MAGIC);
        header[3..7].copy_from_slice(&self.width.to_be_bytes());
        header[7..11].copy_from_slice(&self.height.to_be_bytes());
        header[11] = self.channels.count() as u8;
        header[12] = self.colorspace;
        w.write_all(&header).map_err(crate::error::EncodeError::Io)
    }

    #[cfg(feature = "std")]
    pub(crate) fn read_header<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let mut header = [0u8; HEADER_SIZE];
        match r.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(DecodeError::BadHeader)
            }
            Err(e) => return Err(DecodeError::Io(e)),
        }

        if header[0..3] != MAGIC {
            return Err(DecodeError::BadHeader);
        }

        let width = u32::from_be_bytes([header[3], header[4], header[5], header[6]]);
        let height = u32::from_be_bytes([header[7], header[8], header[9], header[10]]);
        let channels = Channels::from_byte(header[11]).ok_or(DecodeError::BadHeader)?;
        let colorspace = header[12];

        if width == 0 || height == 0 {
            return Err(DecodeError::BadHeader);
        }

        Ok(Descriptor { width, height, channels, colorspace })
    }
}
