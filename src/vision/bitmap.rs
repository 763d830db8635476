//! Captured frame wrapper with cached color-space conversions

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage, RgbaImage};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use super::histogram::Histogram;
use crate::{Error, Result};

/// Channel encoding a frame can be converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// Red, green, blue, alpha
    Rgba,
    /// Red, green, blue
    Rgb,
    /// Hue, saturation, value, each scaled to 0-255
    Hsv,
    /// Single luminance channel
    Luma,
}

const MODE_COUNT: usize = 4;

impl ColorMode {
    fn index(self) -> usize {
        match self {
            ColorMode::Rgba => 0,
            ColorMode::Rgb => 1,
            ColorMode::Hsv => 2,
            ColorMode::Luma => 3,
        }
    }

    /// Number of channels produced by this mode
    pub fn channel_count(self) -> usize {
        match self {
            ColorMode::Rgba => 4,
            ColorMode::Rgb | ColorMode::Hsv => 3,
            ColorMode::Luma => 1,
        }
    }
}

impl FromStr for ColorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "RGBA" => Ok(ColorMode::Rgba),
            "RGB" => Ok(ColorMode::Rgb),
            "HSV" => Ok(ColorMode::Hsv),
            "L" | "LUMA" => Ok(ColorMode::Luma),
            _ => Err(Error::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::Rgba => write!(f, "RGBA"),
            ColorMode::Rgb => write!(f, "RGB"),
            ColorMode::Hsv => write!(f, "HSV"),
            ColorMode::Luma => write!(f, "L"),
        }
    }
}

/// Rectangular box in pixel coordinates; `right` and `bottom` are exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    /// Box from `(left, top)` inclusive to `(right, bottom)` exclusive
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in pixels (zero if inverted)
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Height in pixels (zero if inverted)
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Check that the box is non-empty and fits inside a `width` x `height` image
    pub fn check_within(&self, width: u32, height: u32) -> Result<()> {
        if self.left >= self.right
            || self.top >= self.bottom
            || self.right > width
            || self.bottom > height
        {
            return Err(Error::InvalidRegion {
                region: *self,
                width,
                height,
            });
        }
        Ok(())
    }
}

impl From<[u32; 4]> for Region {
    fn from([left, top, right, bottom]: [u32; 4]) -> Self {
        Self::new(left, top, right, bottom)
    }
}

impl From<Region> for [u32; 4] {
    fn from(r: Region) -> Self {
        [r.left, r.top, r.right, r.bottom]
    }
}

/// A frame converted to one color mode
#[derive(Debug, Clone)]
pub enum ModeImage {
    Rgba(RgbaImage),
    Rgb(RgbImage),
    Hsv(RgbImage),
    Luma(GrayImage),
}

impl ModeImage {
    /// Mode this image is encoded in
    pub fn mode(&self) -> ColorMode {
        match self {
            ModeImage::Rgba(_) => ColorMode::Rgba,
            ModeImage::Rgb(_) => ColorMode::Rgb,
            ModeImage::Hsv(_) => ColorMode::Hsv,
            ModeImage::Luma(_) => ColorMode::Luma,
        }
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ModeImage::Rgba(img) => img.dimensions(),
            ModeImage::Rgb(img) | ModeImage::Hsv(img) => img.dimensions(),
            ModeImage::Luma(img) => img.dimensions(),
        }
    }

    /// Number of pixels
    pub fn pixel_count(&self) -> u64 {
        let (w, h) = self.dimensions();
        w as u64 * h as u64
    }

    /// Copy out a sub-region
    pub fn crop(&self, region: Region) -> Result<ModeImage> {
        let (w, h) = self.dimensions();
        region.check_within(w, h)?;
        let (x, y, cw, ch) = (region.left, region.top, region.width(), region.height());

        Ok(match self {
            ModeImage::Rgba(img) => ModeImage::Rgba(imageops::crop_imm(img, x, y, cw, ch).to_image()),
            ModeImage::Rgb(img) => ModeImage::Rgb(imageops::crop_imm(img, x, y, cw, ch).to_image()),
            ModeImage::Hsv(img) => ModeImage::Hsv(imageops::crop_imm(img, x, y, cw, ch).to_image()),
            ModeImage::Luma(img) => ModeImage::Luma(imageops::crop_imm(img, x, y, cw, ch).to_image()),
        })
    }

    /// Per-channel histogram, 256 bins each
    pub fn histogram(&self) -> Histogram {
        match self {
            ModeImage::Rgba(img) => imageproc::stats::histogram(img).into(),
            ModeImage::Rgb(img) | ModeImage::Hsv(img) => imageproc::stats::histogram(img).into(),
            ModeImage::Luma(img) => imageproc::stats::histogram(img).into(),
        }
    }
}

/// One captured frame.
///
/// Conversions are computed the first time a mode is requested and kept for
/// the lifetime of the view. The source bitmap is never modified, so cached
/// conversions cannot go stale.
pub struct BitmapView {
    source: DynamicImage,
    captured_at: Instant,
    cache: [OnceCell<ModeImage>; MODE_COUNT],
}

impl BitmapView {
    /// Wrap a frame captured now
    pub fn new(image: DynamicImage) -> Self {
        Self::with_timestamp(image, Instant::now())
    }

    /// Wrap a frame captured at `captured_at`
    pub fn with_timestamp(image: DynamicImage, captured_at: Instant) -> Self {
        Self {
            source: image,
            captured_at,
            cache: Default::default(),
        }
    }

    /// Decode an encoded image (PNG, BMP, ...)
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    /// Decode a base64 screenshot payload, with or without a `data:` URI prefix
    pub fn from_base64(data: &str) -> Result<Self> {
        let payload = match data.split_once(',') {
            Some((header, body)) if header.starts_with("data:") => body,
            _ => data,
        };
        let bytes = STANDARD.decode(payload.trim())?;
        Self::decode(&bytes)
    }

    /// When this frame was captured
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// The unconverted frame
    pub fn source(&self) -> &DynamicImage {
        &self.source
    }

    /// The frame in the requested color mode
    pub fn get_by_mode(&self, mode: ColorMode) -> &ModeImage {
        self.cache[mode.index()].get_or_init(|| convert(&self.source, mode))
    }

    /// Like [`get_by_mode`](Self::get_by_mode), with the mode given by name
    pub fn get_by_mode_name(&self, mode: &str) -> Result<&ModeImage> {
        Ok(self.get_by_mode(mode.parse()?))
    }

    /// Copy out a sub-region of the unconverted frame
    pub fn crop(&self, region: Region) -> Result<DynamicImage> {
        region.check_within(self.source.width(), self.source.height())?;
        Ok(self
            .source
            .crop_imm(region.left, region.top, region.width(), region.height()))
    }

    /// Per-channel histogram of the whole frame in `mode`
    pub fn histogram(&self, mode: ColorMode) -> Histogram {
        self.get_by_mode(mode).histogram()
    }

    /// Width x height of the full frame
    pub fn total_pixel_count(&self) -> u64 {
        self.source.width() as u64 * self.source.height() as u64
    }

    fn is_cached(&self, mode: ColorMode) -> bool {
        self.cache[mode.index()].get().is_some()
    }
}

impl fmt::Debug for BitmapView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cached: Vec<ColorMode> = [ColorMode::Rgba, ColorMode::Rgb, ColorMode::Hsv, ColorMode::Luma]
            .into_iter()
            .filter(|m| self.is_cached(*m))
            .collect();
        f.debug_struct("BitmapView")
            .field("width", &self.source.width())
            .field("height", &self.source.height())
            .field("cached", &cached)
            .finish()
    }
}

fn convert(source: &DynamicImage, mode: ColorMode) -> ModeImage {
    match mode {
        ColorMode::Rgba => ModeImage::Rgba(source.to_rgba8()),
        ColorMode::Rgb => ModeImage::Rgb(source.to_rgb8()),
        ColorMode::Hsv => ModeImage::Hsv(rgb_to_hsv(&source.to_rgb8())),
        ColorMode::Luma => ModeImage::Luma(source.to_luma8()),
    }
}

fn rgb_to_hsv(rgb: &RgbImage) -> RgbImage {
    let mut out = RgbImage::new(rgb.width(), rgb.height());
    for (src, dst) in rgb.pixels().zip(out.pixels_mut()) {
        *dst = Rgb(hsv_pixel(src.0));
    }
    out
}

/// 8-bit HSV: hue is the fraction of the color wheel scaled to 0-255
fn hsv_pixel([r, g, b]: [u8; 3]) -> [u8; 3] {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    if maxc == minc {
        return [0, 0, maxc];
    }

    let span = (maxc - minc) as f32;
    let s = span / maxc as f32;
    let rc = (maxc - r) as f32 / span;
    let gc = (maxc - g) as f32 / span;
    let bc = (maxc - b) as f32 / span;

    // Sextant sums in f64, narrowed to f32 before scaling. Hue thresholds
    // are tuned to this rounding.
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        (2.0 + rc as f64 - bc as f64) as f32
    } else {
        (4.0 + gc as f64 - rc as f64) as f32
    };
    let h = ((h as f64 / 6.0 + 1.0) % 1.0) as f32;

    // float -> u8 casts saturate
    [(h as f64 * 255.0) as u8, (s as f64 * 255.0) as u8, maxc]
}
