//! Image saving utilities.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, RgbImage};

use crate::error::{Error, Result};

/// Container format for saved images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Lossless PNG with maximum compression.
    Png,
    /// JPEG at a configurable quality.
    #[default]
    Jpg,
}

impl OutputFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
        }
    }
}

/// Save an RGB buffer to `path`.
///
/// # Arguments
///
/// * `img` - Opaque 8-bit image
/// * `path` - Output file path; the extension is not inspected
/// * `format` - Container to encode
/// * `quality` - JPEG quality (1-100), ignored for PNG
///
/// # Errors
///
/// Returns an error if the file cannot be created or encoded.
pub fn save_rgb<P: AsRef<Path>>(
    img: &RgbImage,
    path: P,
    format: OutputFormat,
    quality: u8,
) -> Result<()> {
    let path = path.as_ref();
    let mut output = BufWriter::new(File::create(path)?);

    let encoded = match format {
        OutputFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut output, CompressionType::Best, FilterType::Adaptive);
            encoder.write_image(
                img.as_raw(),
                img.width(),
                img.height(),
                image::ExtendedColorType::Rgb8,
            )
        }
        OutputFormat::Jpg => {
            let encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
            img.write_with_encoder(encoder)
        }
    };

    encoded.map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;
    output.flush()?;

    Ok(())
}

/// Split a newline separated list of names, trimming and dropping blanks.
#[must_use]
pub fn parse_filenames(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Base name (no extension) for batch element `index`.
///
/// Uses the stem of `names[index]` when present, otherwise a zero-padded
/// index. `prefix` is prepended in both cases.
#[must_use]
pub fn output_base_name(index: usize, names: &[String], prefix: &str) -> String {
    let base = names
        .get(index)
        .map(|name| strip_extension(name).to_string())
        .unwrap_or_else(|| format!("{index:05}"));

    format!("{prefix}{base}")
}

/// Drop the last extension of the final path component, keeping leading dots.
fn strip_extension(name: &str) -> &str {
    let start = name.rfind('/').map_or(0, |pos| pos + 1);
    let file = &name[start..];
    let leading = file.len() - file.trim_start_matches('.').len();

    match file.rfind('.') {
        Some(pos) if pos > leading => &name[..start + pos],
        _ => name,
    }
}
