#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "std")]
use std::io::Write;

use crate::bitstream::{pack_type1, pack_type2, SHORT_RUN_MAX_LEN, TYPE0_MAX_LEN};
use crate::cache::{hash, Cache};
use crate::descriptor::{Descriptor, FOOTER};
use crate::error::EncodeError;
use crate::pixel::Pixel;
use crate::run::{RunKind, RunState};
use crate::{RowEvent, RowSource};

/// Drives the pixel-by-pixel run-selection state machine: match / type-1
/// inertia / cache-hit / classify-diff, in that priority order, plus the
/// flush rules that bound every run at its max length.
pub struct Encoder {
    descriptor: Descriptor,
    cache: Cache,
    previous: Pixel,
    run: RunState,
}

impl Encoder {
    pub fn new(descriptor: Descriptor) -> Self {
        Encoder {
            descriptor,
            cache: Cache::new(),
            previous: Pixel::INITIAL_PREVIOUS,
            run: RunState::None,
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Row driver: writes the header, pulls rows from `source` one at a
    /// time until EOF, then flushes the trailing run and writes the
    /// footer. Neither the encoder nor `source` needs to hold the whole
    /// image in memory — one row buffer is all that is allocated here.
    #[cfg(feature = "std")]
    pub fn encode<S, W>(&mut self, source: &mut S, writer: &mut W) -> Result<(), EncodeError>
    where
        S: RowSource,
        W: Write,
    {
        self.descriptor.write_header(writer)?;

        let width = self.descriptor.width as usize;
        let mut row = vec![0u8; width * 4];

        loop {
            match source
                .next_row(&mut row)
                .map_err(|e| EncodeError::Source(Box::new(e)))?
            {
                RowEvent::Eof => break,
                RowEvent::Row => self.encode_row(&row, writer)?,
            }
        }

        self.run.flush(self.descriptor.channels.count(), writer)?;
        writer.write_all(&FOOTER)?;
        Ok(())
    }

    #[cfg(feature = "std")]
    fn encode_row<W: Write>(&mut self, row_rgba: &[u8], writer: &mut W) -> Result<(), EncodeError> {
        let has_alpha = self.descriptor.channels.has_alpha();
        for chunk in row_rgba.chunks_exact(4) {
            let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let p = if has_alpha {
                Pixel::from_rgba(bytes)
            } else {
                Pixel::from_rgba_opaque(bytes)
            };
            self.encode_pixel(p, writer)?;
        }
        Ok(())
    }

    #[cfg(feature = "std")]
    fn encode_pixel<W: Write>(&mut self, p: Pixel, writer: &mut W) -> Result<(), EncodeError> {
        let prev = core::mem::replace(&mut self.previous, p);

        // 1. Match: extend (or open) a type-0 run.
        if p == prev {
            let extend = matches!(&self.run, RunState::Type0 { len } if *len < TYPE0_MAX_LEN);
            if extend {
                if let RunState::Type0 { len } = &mut self.run {
                    *len += 1;
                }
            } else {
                self.run.flush(self.descriptor.channels.count(), writer)?;
                self.run = RunState::Type0 { len: 1 };
            }
            return Ok(());
        }

        let diff = p.xor(prev);

        // 2. Type-1 inertia (rule A): an open type-1 run is never
        // interrupted by a cache hit, so this check has priority over step 3.
        if self.run.kind() == RunKind::Type1 && self.run.len() >= 1 && diff.fits_type1() {
            let arg = pack_type1(diff);
            if self.run.len() == SHORT_RUN_MAX_LEN {
                self.run.flush(self.descriptor.channels.count(), writer)?;
                let mut buf = [0u8; 32];
                buf[0] = arg;
                self.run = RunState::Type1 { buf, len: 1 };
            } else if let RunState::Type1 { buf, len } = &mut self.run {
                buf[*len as usize] = arg;
                *len += 1;
            }
            self.cache.insert(p);
            return Ok(());
        }

        // 3. Cache hit.
        if self.cache.contains(p) {
            let slot = hash(p);
            self.run.flush(self.descriptor.channels.count(), writer)?;
            writer.write_all(&[slot])?;
            return Ok(());
        }

        // 4. Classify the diff: small (type 1), medium (type 2), or literal
        // (type 3). Rule B keeps an open type-2 run from ever demoting to
        // type 1 — the `kind() != Type2` guard below is that rule.
        if diff.fits_type1() && self.run.kind() != RunKind::Type2 {
            self.open_or_extend_type1(diff, writer)?;
        } else if diff.fits_type2() {
            self.open_or_extend_type2(diff, writer)?;
        } else {
            self.open_or_extend_type3(p, writer)?;
        }

        self.cache.insert(p);
        Ok(())
    }

    #[cfg(feature = "std")]
    fn open_or_extend_type1<W: Write>(&mut self, diff: Pixel, writer: &mut W) -> Result<(), EncodeError> {
        let channels = self.descriptor.channels.count();
        let need_flush = match self.run.kind() {
            RunKind::Type0 | RunKind::Type3 => self.run.len() > 0,
            RunKind::Type1 => self.run.len() == SHORT_RUN_MAX_LEN,
            RunKind::Type2 | RunKind::None => false,
        };
        if need_flush {
            self.run.flush(channels, writer)?;
        }
        if self.run.kind() != RunKind::Type1 {
            self.run = RunState::Type1 { buf: [0u8; 32], len: 0 };
        }
        if let RunState::Type1 { buf, len } = &mut self.run {
            buf[*len as usize] = pack_type1(diff);
            *len += 1;
        }
        Ok(())
    }

    #[cfg(feature = "std")]
    fn open_or_extend_type2<W: Write>(&mut self, diff: Pixel, writer: &mut W) -> Result<(), EncodeError> {
        let channels = self.descriptor.channels.count();
        let need_flush = self.run.kind() != RunKind::Type2 || self.run.len() == SHORT_RUN_MAX_LEN;
        if need_flush {
            self.run.flush(channels, writer)?;
        }
        if self.run.kind() != RunKind::Type2 {
            self.run = RunState::Type2 { buf: [0u8; 64], len: 0 };
        }
        if let RunState::Type2 { buf, len } = &mut self.run {
            let bytes = pack_type2(diff);
            let base = *len as usize * 2;
            buf[base] = bytes[0];
            buf[base + 1] = bytes[1];
            *len += 1;
        }
        Ok(())
    }

    #[cfg(feature = "std")]
    fn open_or_extend_type3<W: Write>(&mut self, p: Pixel, writer: &mut W) -> Result<(), EncodeError> {
        let channels = self.descriptor.channels.count();
        let need_flush = self.run.kind() != RunKind::Type3 || self.run.len() == SHORT_RUN_MAX_LEN;
        if need_flush {
            self.run.flush(channels, writer)?;
        }
        if self.run.kind() != RunKind::Type3 {
            self.run = RunState::Type3 { buf: [0u8; 128], len: 0 };
        }
        if let RunState::Type3 { buf, len } = &mut self.run {
            let base = *len as usize * channels;
            let raw = p.to_rgba();
            buf[base..base + channels].copy_from_slice(&raw[..channels]);
            *len += 1;
        }
        Ok(())
    }
}
