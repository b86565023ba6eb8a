#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "std")]
use std::io::Read;

use crate::bitstream::{decode_type0_length, type0_trailing_bytes, unpack_type1, unpack_type2, RUN_BIT};
use crate::cache::Cache;
use crate::descriptor::{Descriptor, FOOTER};
use crate::error::{map_read_exact, DecodeError};
use crate::pixel::Pixel;
use crate::RowSink;

/// The header, byte count, and footer status produced by a completed
/// [`Decoder::decode`]. A missing or malformed footer is not itself an
/// error — per the container format, pixels already decoded remain valid —
/// call [`DecodeOutcome::require_footer`] to turn that into a hard error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub descriptor: Descriptor,
    pub pixels_decoded: u64,
    pub footer_present: bool,
}

impl DecodeOutcome {
    pub fn require_footer(&self) -> Result<(), DecodeError> {
        if self.footer_present {
            Ok(())
        } else {
            Err(DecodeError::NoFooter)
        }
    }
}

/// Drives the opcode-dispatch loop: INDEX vs. one of the 4 RUN sub-types,
/// feeding fully decoded rows to a [`RowSink`] as soon as each fills.
pub struct Decoder {
    cache: Cache,
    previous: Pixel,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder { cache: Cache::new(), previous: Pixel::INITIAL_PREVIOUS }
    }

    /// Reads just the 13-byte header. Callers that need the image
    /// dimensions before they can set up their [`RowSink`] (for example, to
    /// open a PNG writer that needs width/height up front) call this first
    /// and then [`Decoder::decode_body`] with the same reader.
    #[cfg(feature = "std")]
    pub fn decode_header<R: Read>(reader: &mut R) -> Result<Descriptor, DecodeError> {
        Descriptor::read_header(reader)
    }

    /// Decodes the header, then the body — the common case when the caller
    /// doesn't need the dimensions before setting up its [`RowSink`].
    #[cfg(feature = "std")]
    pub fn decode<R, K>(&mut self, reader: &mut R, sink: &mut K) -> Result<DecodeOutcome, DecodeError>
    where
        R: Read,
        K: RowSink,
    {
        let descriptor = Self::decode_header(reader)?;
        self.decode_body(descriptor, reader, sink)
    }

    /// Decodes the opcode stream and footer that follow a header already
    /// consumed via [`Decoder::decode_header`].
    #[cfg(feature = "std")]
    pub fn decode_body<R, K>(
        &mut self,
        descriptor: Descriptor,
        reader: &mut R,
        sink: &mut K,
    ) -> Result<DecodeOutcome, DecodeError>
    where
        R: Read,
        K: RowSink,
    {
        let channels = descriptor.channels.count();
        let has_alpha = descriptor.channels.has_alpha();
        let width = descriptor.width as usize;
        let total_pixels = descriptor.pixel_count();

        let mut row = vec![0u8; width * channels];
        let mut col = 0usize;
        let mut pixels_decoded: u64 = 0;

        while pixels_decoded < total_pixels {
            let mut opcode_buf = [0u8; 1];
            reader.read_exact(&mut opcode_buf).map_err(map_read_exact)?;
            let opcode = opcode_buf[0];

            if opcode & RUN_BIT == 0 {
                let p = self.cache.get(opcode);
                self.previous = p;
                pixels_decoded += self.emit(p, has_alpha, channels, width, &mut row, &mut col, sink)?;
                continue;
            }

            let run_type = (opcode >> 5) & 0x03;
            let low5 = opcode & 0x1F;

            match run_type {
                0 => {
                    let trailing_len = type0_trailing_bytes(low5) as usize;
                    let mut trailing = [0u8; 2];
                    reader
                        .read_exact(&mut trailing[..trailing_len])
                        .map_err(map_read_exact)?;
                    let len = decode_type0_length(low5, &trailing[..trailing_len]);
                    let p = self.previous;
                    for _ in 0..len {
                        pixels_decoded += self.emit(p, has_alpha, channels, width, &mut row, &mut col, sink)?;
                    }
                }
                1 => {
                    let len = low5 as usize + 1;
                    for _ in 0..len {
                        let mut byte = [0u8; 1];
                        reader.read_exact(&mut byte).map_err(map_read_exact)?;
                        let diff = unpack_type1(byte[0]);
                        let mut p = self.previous.xor(diff);
                        if !has_alpha {
                            p.a = 255;
                        }
                        self.cache.insert(p);
                        self.previous = p;
                        pixels_decoded += self.emit(p, has_alpha, channels, width, &mut row, &mut col, sink)?;
                    }
                }
                2 => {
                    let len = low5 as usize + 1;
                    for _ in 0..len {
                        let mut bytes = [0u8; 2];
                        reader.read_exact(&mut bytes).map_err(map_read_exact)?;
                        let diff = unpack_type2(bytes);
                        let p = self.previous.xor(diff);
                        self.cache.insert(p);
                        self.previous = p;
                        pixels_decoded += self.emit(p, has_alpha, channels, width, &mut row, &mut col, sink)?;
                    }
                }
                _ => {
                    let len = low5 as usize + 1;
                    for _ in 0..len {
                        let mut bytes = [0u8; 4];
                        reader
                            .read_exact(&mut bytes[..channels])
                            .map_err(map_read_exact)?;
                        let p = if has_alpha {
                            Pixel::from_rgba(bytes)
                        } else {
                            Pixel::from_rgba_opaque(bytes)
                        };
                        self.cache.insert(p);
                        self.previous = p;
                        pixels_decoded += self.emit(p, has_alpha, channels, width, &mut row, &mut col, sink)?;
                    }
                }
            }
        }

        // Tolerate either the full 8-byte constant or just its terminating
        // `0x01` byte, so read incrementally instead of demanding all 8.
        let mut footer_buf = [0u8; 8];
        let mut footer_len = 0usize;
        while footer_len < footer_buf.len() {
            let n = reader.read(&mut footer_buf[footer_len..]).map_err(DecodeError::Io)?;
            if n == 0 {
                break;
            }
            footer_len += n;
        }
        let footer_present = match footer_len {
            8 => footer_buf == FOOTER,
            1 => footer_buf[0] == FOOTER[7],
            _ => false,
        };

        Ok(DecodeOutcome { descriptor, pixels_decoded, footer_present })
    }

    #[cfg(feature = "std")]
    #[allow(clippy::too_many_arguments)]
    fn emit<K: RowSink>(
        &self,
        p: Pixel,
        has_alpha: bool,
        channels: usize,
        width: usize,
        row: &mut [u8],
        col: &mut usize,
        sink: &mut K,
    ) -> Result<u64, DecodeError> {
        let base = *col * channels;
        if has_alpha {
            row[base..base + 4].copy_from_slice(&p.to_rgba());
        } else {
            row[base..base + 3].copy_from_slice(&p.to_rgb());
        }
        *col += 1;
        if *col == width {
            sink.emit_row(row).map_err(|e| DecodeError::Sink(Box::new(e)))?;
            *col = 0;
        }
        Ok(1)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::bitstream::{pack_type1, run_opcode};
    use crate::descriptor::Channels;
    use crate::encode::Encoder;
    use crate::{RowEvent, RowSource};

    struct SliceSource<'a> {
        rows: core::slice::Chunks<'a, u8>,
    }

    impl<'a> SliceSource<'a> {
        fn new(pixels_rgba: &'a [u8], width: usize) -> Self {
            SliceSource { rows: pixels_rgba.chunks(width * 4) }
        }
    }

    impl<'a> RowSource for SliceSource<'a> {
        type Error = std::io::Error;

        fn next_row(&mut self, buf: &mut [u8]) -> Result<RowEvent, Self::Error> {
            match self.rows.next() {
                Some(row) => {
                    buf.copy_from_slice(row);
                    Ok(RowEvent::Row)
                }
                None => Ok(RowEvent::Eof),
            }
        }
    }

    struct VecSink {
        rows: Vec<Vec<u8>>,
    }

    impl RowSink for VecSink {
        type Error = std::io::Error;

        fn emit_row(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
            self.rows.push(buf.to_vec());
            Ok(())
        }
    }

    fn round_trip(pixels_rgba: &[u8], width: u32, height: u32, channels: Channels) -> Vec<u8> {
        let descriptor = Descriptor::new(width, height, channels);
        let mut encoder = Encoder::new(descriptor);
        let mut source = SliceSource::new(pixels_rgba, width as usize);
        let mut encoded = Vec::new();
        encoder.encode(&mut source, &mut encoded).unwrap();

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        let outcome = decoder.decode(&mut &encoded[..], &mut sink).unwrap();
        assert_eq!(outcome.descriptor, descriptor);
        assert_eq!(outcome.pixels_decoded, descriptor.pixel_count());
        assert!(outcome.footer_present);

        sink.rows.concat()
    }

    #[test]
    fn round_trips_a_single_pixel() {
        let decoded = round_trip(&[1, 2, 3, 4], 1, 1, Channels::Rgba);
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn round_trips_a_solid_run_past_the_short_form_boundary() {
        let px = [7u8, 7, 7, 7];
        let mut pixels = Vec::new();
        for _ in 0..40 {
            pixels.extend_from_slice(&px);
        }
        let decoded = round_trip(&pixels, 40, 1, Channels::Rgba);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn round_trips_small_diffs_and_cache_hits() {
        let mut pixels = Vec::new();
        let base = [100u8, 150, 200, 255];
        for i in 0..40u8 {
            pixels.extend_from_slice(&[
                base[0].wrapping_add(i % 3),
                base[1],
                base[2],
                base[3],
            ]);
        }
        let decoded = round_trip(&pixels, 40, 1, Channels::Rgba);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn round_trips_random_like_pixels_as_literals() {
        let mut pixels = Vec::new();
        let mut x: u32 = 0x1234_5678;
        for _ in 0..64 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            let bytes = x.to_le_bytes();
            pixels.extend_from_slice(&bytes);
        }
        let decoded = round_trip(&pixels, 64, 1, Channels::Rgba);
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn three_channel_round_trip_drops_alpha() {
        let pixels = vec![1u8, 2, 3, 9, 4, 5, 6, 9];
        let descriptor = Descriptor::new(2, 1, Channels::Rgb);
        let mut encoder = Encoder::new(descriptor);
        let mut source = SliceSource::new(&pixels, 2);
        let mut encoded = Vec::new();
        encoder.encode(&mut source, &mut encoded).unwrap();

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        decoder.decode(&mut &encoded[..], &mut sink).unwrap();
        assert_eq!(sink.rows.concat(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn truncated_stream_is_reported() {
        let pixels = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let descriptor = Descriptor::new(2, 1, Channels::Rgba);
        let mut encoder = Encoder::new(descriptor);
        let mut source = SliceSource::new(&pixels, 2);
        let mut encoded = Vec::new();
        encoder.encode(&mut source, &mut encoded).unwrap();
        // Drop the footer and the second pixel's literal bytes, so the
        // opcode's declared run length can't be satisfied from the stream.
        let cut = encoded.len() - 12;
        encoded.truncate(cut);

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        let err = decoder.decode(&mut &encoded[..], &mut sink).unwrap_err();
        assert_eq!(err, DecodeError::Truncated);
    }

    #[test]
    fn missing_footer_is_reported_through_decode_outcome() {
        let pixels = vec![1u8, 2, 3, 4];
        let descriptor = Descriptor::new(1, 1, Channels::Rgba);
        let mut encoder = Encoder::new(descriptor);
        let mut source = SliceSource::new(&pixels, 1);
        let mut encoded = Vec::new();
        encoder.encode(&mut source, &mut encoded).unwrap();
        let cut = encoded.len() - 8;
        encoded.truncate(cut);

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        let outcome = decoder.decode(&mut &encoded[..], &mut sink).unwrap();
        assert_eq!(outcome.pixels_decoded, 1);
        assert!(!outcome.footer_present);
        assert_eq!(outcome.require_footer(), Err(DecodeError::NoFooter));
    }

    #[test]
    fn footer_truncated_to_its_terminating_byte_still_counts_as_present() {
        let pixels = vec![1u8, 2, 3, 4];
        let descriptor = Descriptor::new(1, 1, Channels::Rgba);
        let mut encoder = Encoder::new(descriptor);
        let mut source = SliceSource::new(&pixels, 1);
        let mut encoded = Vec::new();
        encoder.encode(&mut source, &mut encoded).unwrap();
        let body_end = encoded.len() - 8;
        encoded.truncate(body_end);
        encoded.push(FOOTER[7]);

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        let outcome = decoder.decode(&mut &encoded[..], &mut sink).unwrap();
        assert_eq!(outcome.pixels_decoded, 1);
        assert!(outcome.footer_present);
    }

    #[test]
    fn type1_run_never_perturbs_alpha_on_a_three_channel_stream() {
        // A crafted type-1 argument byte with a nonzero alpha field (da=3)
        // must not leak into the decoded pixel's alpha for an RGB stream —
        // it has to stay pinned at 255 so cache hashing stays coherent.
        let descriptor = Descriptor::new(1, 1, Channels::Rgb);
        let mut encoded = Vec::new();
        descriptor.write_header(&mut encoded).unwrap();
        encoded.push(run_opcode(1, 0));
        encoded.push(pack_type1(Pixel::new(1, 0, 0, 3)));
        encoded.extend_from_slice(&FOOTER);

        let mut decoder = Decoder::new();
        let mut sink = VecSink { rows: Vec::new() };
        decoder.decode(&mut &encoded[..], &mut sink).unwrap();
        assert_eq!(sink.rows.concat(), vec![1, 0, 0]);
    }
}
