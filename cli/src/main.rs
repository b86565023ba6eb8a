use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use rpk::{Channels, Decoder, Descriptor, Encoder, RowEvent, RowSink, RowSource};

enum Format {
    Rpk,
    Png,
}

fn format_from_extension(path: &Path) -> Result<Format, ()> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("rpk") => Ok(Format::Rpk),
        Some("png") => Ok(Format::Png),
        other => {
            log::error!(
                "'{}' has unsupported extension {:?}; expected .rpk or .png",
                path.display(),
                other
            );
            Err(())
        }
    }
}

fn main() -> Result<(), ()> {
    env_logger::init();

    let mut args = std::env::args();

    if args.len() < 2 {
        eprintln!("Usage: rpkconv <input-path> [<output-path>]");
        eprintln!("Example: rpkconv images/foo.png images/foo.rpk");
        return Err(());
    }
    args.next();

    let input = PathBuf::from(args.next().unwrap());
    let input_format = format_from_extension(&input)?;

    let output = match args.next() {
        Some(path) => PathBuf::from(path),
        None => match input_format {
            Format::Rpk => input.with_extension("png"),
            Format::Png => input.with_extension("rpk"),
        },
    };

    if output.exists() {
        log::error!("output path '{}' already occupied", output.display());
        return Err(());
    }

    let output_format = format_from_extension(&output)?;

    match (input_format, output_format) {
        (Format::Png, Format::Rpk) => png_to_rpk(&input, &output),
        (Format::Rpk, Format::Png) => rpk_to_png(&input, &output),
        (Format::Png, Format::Png) | (Format::Rpk, Format::Rpk) => {
            log::error!("input and output must be different formats");
            Err(())
        }
    }
}

/// Adapts a streaming [`png::Reader`] to [`RowSource`], normalizing
/// whatever color type the PNG carries down to RGBA8 one row at a time.
struct PngRowSource<R: Read> {
    reader: png::Reader<R>,
    color_type: png::ColorType,
}

impl<R: Read> RowSource for PngRowSource<R> {
    type Error = png::DecodingError;

    fn next_row(&mut self, buf: &mut [u8]) -> Result<RowEvent, Self::Error> {
        let row = match self.reader.next_row()? {
            Some(row) => row,
            None => return Ok(RowEvent::Eof),
        };
        let data = row.data();
        match self.color_type {
            png::ColorType::Rgba => buf.copy_from_slice(data),
            png::ColorType::Rgb => {
                for (src, dst) in data.chunks_exact(3).zip(buf.chunks_exact_mut(4)) {
                    dst[0] = src[0];
                    dst[1] = src[1];
                    dst[2] = src[2];
                    dst[3] = 255;
                }
            }
            png::ColorType::GrayscaleAlpha => {
                for (src, dst) in data.chunks_exact(2).zip(buf.chunks_exact_mut(4)) {
                    dst[0] = src[0];
                    dst[1] = src[0];
                    dst[2] = src[0];
                    dst[3] = src[1];
                }
            }
            png::ColorType::Grayscale => {
                for (src, dst) in data.iter().zip(buf.chunks_exact_mut(4)) {
                    dst[0] = *src;
                    dst[1] = *src;
                    dst[2] = *src;
                    dst[3] = 255;
                }
            }
            png::ColorType::Indexed => {
                unreachable!("EXPAND transformation leaves no indexed rows")
            }
        }
        Ok(RowEvent::Row)
    }
}

fn png_to_rpk(input: &Path, output: &Path) -> Result<(), ()> {
    let file = File::open(input)
        .map_err(|e| log::error!("failed to open '{}': {}", input.display(), e))?;

    let mut png_decoder = png::Decoder::new(BufReader::new(file));
    png_decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);

    let reader = png_decoder
        .read_info()
        .map_err(|e| log::error!("failed to read PNG header '{}': {}", input.display(), e))?;

    let info = reader.info();
    let width = info.width;
    let height = info.height;
    let color_type = info.color_type;
    let has_alpha = matches!(color_type, png::ColorType::Rgba | png::ColorType::GrayscaleAlpha);
    let channels = if has_alpha { Channels::Rgba } else { Channels::Rgb };

    log::info!(
        "encoding '{}' ({}x{}, {:?}) to '{}'",
        input.display(),
        width,
        height,
        color_type,
        output.display()
    );

    let descriptor = Descriptor::new(width, height, channels);
    let mut encoder = Encoder::new(descriptor);
    let mut source = PngRowSource { reader, color_type };

    let out_file = File::create(output)
        .map_err(|e| log::error!("failed to create '{}': {}", output.display(), e))?;
    let mut writer = BufWriter::new(out_file);

    encoder
        .encode(&mut source, &mut writer)
        .map_err(|e| log::error!("failed to encode '{}': {}", input.display(), e))
}

/// Adapts a streaming [`png::StreamWriter`] to [`RowSink`].
struct PngRowSink<'a, W: Write> {
    writer: png::StreamWriter<'a, W>,
}

impl<'a, W: Write> RowSink for PngRowSink<'a, W> {
    type Error = png::EncodingError;

    fn emit_row(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.writer.write_all(buf).map_err(png::EncodingError::from)
    }
}

fn rpk_to_png(input: &Path, output: &Path) -> Result<(), ()> {
    let in_file = File::open(input)
        .map_err(|e| log::error!("failed to open '{}': {}", input.display(), e))?;
    let mut reader = BufReader::new(in_file);

    let descriptor = Decoder::decode_header(&mut reader)
        .map_err(|e| log::error!("failed to read RPK header '{}': {}", input.display(), e))?;

    log::info!(
        "decoding '{}' ({}x{}, {:?}) to '{}'",
        input.display(),
        descriptor.width,
        descriptor.height,
        descriptor.channels,
        output.display()
    );

    let out_file = File::create(output)
        .map_err(|e| log::error!("failed to create '{}': {}", output.display(), e))?;
    let mut png_encoder = png::Encoder::new(BufWriter::new(out_file), descriptor.width, descriptor.height);
    png_encoder.set_color(match descriptor.channels {
        Channels::Rgba => png::ColorType::Rgba,
        Channels::Rgb => png::ColorType::Rgb,
    });
    png_encoder.set_depth(png::BitDepth::Eight);

    let png_writer = png_encoder
        .write_header()
        .map_err(|e| log::error!("failed to write PNG header '{}': {}", output.display(), e))?;
    let stream_writer = png_writer
        .into_stream_writer()
        .map_err(|e| log::error!("failed to open PNG stream writer '{}': {}", output.display(), e))?;

    let mut sink = PngRowSink { writer: stream_writer };
    let mut decoder = Decoder::new();
    let outcome = decoder
        .decode_body(descriptor, &mut reader, &mut sink)
        .map_err(|e| log::error!("failed to decode '{}': {}", input.display(), e))?;

    if !outcome.footer_present {
        log::warn!("'{}' is missing its footer; recovered pixels were still written", input.display());
    }

    sink.writer
        .finish()
        .map_err(|e| log::error!("failed to finalize PNG '{}': {}", output.display(), e))
}
