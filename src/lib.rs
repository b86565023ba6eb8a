//! RPK - a lossless, byte-oriented codec for 8-bit RGB/RGBA raster images.
//!
//! RPK is a QOI-family format: a rolling 128-slot color cache plus a small
//! set of run-length opcodes, decided pixel by pixel with no entropy coding
//! stage. Images are encoded top to bottom, left to right; the previous
//! pixel and the color cache both start at `(0, 0, 0, 0)` (3-channel streams
//! additionally pin alpha at 255 throughout).
//!
//! # Container
//!
//! A 13-byte header, opcode bytes, then an 8-byte footer:
//!
//! ```text
//! .- header (13 bytes) --------------------------------------.
//! | magic[3]="rpk" | width (u32 BE) | height (u32 BE) | channels (u8) | colorspace (u8) |
//! `------------------------------------------------------------'
//! ```
//!
//! `channels` is `3` (RGB) or `4` (RGBA); any other value is a malformed
//! header. `colorspace` is opaque to this crate — it is written as `0` and
//! passed through verbatim on decode. The footer is always the 8 bytes
//! `00 00 00 00 00 00 00 01`.
//!
//! # Opcodes
//!
//! Every opcode byte's high bit selects INDEX (`0`) or RUN (`1`):
//!
//! ```text
//! .- INDEX -----------------.  .- RUN ---------------------------.
//! |  0  |      slot (7)     |  |  1  |  type (2)  |   arg (5)     |
//! `--------------------------'  `----------------------------------'
//! ```
//!
//! `INDEX` re-emits the pixel currently held at color-cache slot `slot`.
//! `RUN` carries one of 4 sub-types:
//!
//! - **type 0** — a run of `len` copies of the previous pixel. `arg` plus up
//!   to 2 trailing bytes encode `len` in `1..=526352`.
//! - **type 1** — up to 32 pixels, each a 1-byte XOR diff from its own
//!   predecessor, every channel (including alpha) bounded to its low 2 bits.
//! - **type 2** — up to 32 pixels, each a 2-byte XOR diff (red/blue 5 bits,
//!   green 6 bits), alpha unperturbed.
//! - **type 3** — up to 32 raw literal pixels, `channels` bytes each (no
//!   alpha byte at all for 3-channel streams).
//!
//! [`Encoder`] and [`Decoder`] implement the pixel-by-pixel state machine
//! that picks among these opcodes, keyed off a 128-slot rolling color cache
//! keyed by a fixed hash of each pixel's channels. Both work row by row
//! through the [`RowSource`] / [`RowSink`] traits, so neither one ever holds
//! a full image in memory.
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

mod bitstream;
mod cache;
mod decode;
mod descriptor;
mod encode;
mod error;
mod pixel;
mod run;

pub use decode::{DecodeOutcome, Decoder};
pub use descriptor::{Channels, Descriptor};
pub use encode::Encoder;

#[cfg(feature = "std")]
pub use error::{DecodeError, EncodeError};

/// Outcome of pulling one row from a [`RowSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowEvent {
    /// `buf` was filled with the next row.
    Row,
    /// There are no more rows.
    Eof,
}

/// Supplies one top-to-bottom, always-4-channel RGBA8 row at a time to
/// [`Encoder::encode`]. Implementations own whatever upstream decoding
/// (a PNG reader, a framebuffer, a network stream) produces the pixels;
/// the encoder never asks for more than one row at once.
#[cfg(feature = "std")]
pub trait RowSource {
    /// Error type surfaced as [`EncodeError::Source`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fill `buf` (exactly `4 * width` bytes) with the next row's RGBA8
    /// pixels, or report that the image is exhausted.
    fn next_row(&mut self, buf: &mut [u8]) -> Result<RowEvent, Self::Error>;
}

/// Accepts one decoded row (`channels * width` bytes, no padding) at a time
/// from [`Decoder::decode`]. The counterpart to [`RowSource`] on the write
/// side — a PNG writer, a framebuffer, a network stream.
#[cfg(feature = "std")]
pub trait RowSink {
    /// Error type surfaced as [`DecodeError::Sink`].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Consume one fully decoded row.
    fn emit_row(&mut self, buf: &[u8]) -> Result<(), Self::Error>;
}
