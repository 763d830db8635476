//! Image detection algorithms
//!
//! Every detector answers one yes/no question about a frame. Detectors
//! compose: [`Detector::Negation`] inverts a child and
//! [`Detector::Debounce`] only passes a child's positives through once they
//! have been seen often enough.

use std::path::Path;

use image::{DynamicImage, Rgba, RgbaImage};

use super::bitmap::{BitmapView, ColorMode, ModeImage, Region};
use super::debounce::DebounceDetector;
use super::histogram::Histogram;
use crate::{Error, Result};

/// Default similarity threshold for [`ReferenceImageDetector`]
pub const DEFAULT_REFERENCE_THRESHOLD: f64 = 0.1;

/// A visual predicate evaluated against one frame
#[derive(Debug)]
pub enum Detector {
    /// Fraction of pixels near a target color
    ColorHistogram(ColorHistogramDetector),
    /// Average difference from a stored reference frame
    ReferenceImage(ReferenceImageDetector),
    /// Logical complement of the child
    Negation(Box<Detector>),
    /// Child positives, confirmed over a trailing time window
    Debounce(DebounceDetector),
    /// Fixed answer
    Constant(bool),
    /// Placeholder that fails when evaluated
    Unimplemented(String),
}

impl Detector {
    /// Evaluate against a frame.
    ///
    /// Only [`Detector::Debounce`] keeps memory between calls, which is why
    /// this takes `&mut self`.
    pub fn evaluate(&mut self, view: &BitmapView) -> Result<bool> {
        match self {
            Detector::ColorHistogram(d) => d.detect(view),
            Detector::ReferenceImage(d) => d.detect(view),
            Detector::Negation(inner) => Ok(!inner.evaluate(view)?),
            Detector::Debounce(d) => d.evaluate(view),
            Detector::Constant(value) => Ok(*value),
            Detector::Unimplemented(name) => Err(Error::NotImplemented(name.clone())),
        }
    }

    /// Wrap in a negation
    pub fn negate(self) -> Self {
        Detector::Negation(Box::new(self))
    }

    /// Wrap in a debounce filter with the default window and count
    pub fn stable(self) -> Self {
        Detector::Debounce(DebounceDetector::new(self))
    }

    /// Forget any accumulated temporal history
    pub fn reset(&mut self) {
        match self {
            Detector::Negation(inner) => inner.reset(),
            Detector::Debounce(d) => d.reset(),
            _ => {}
        }
    }

    /// Short name of the variant, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Detector::ColorHistogram(_) => "color",
            Detector::ReferenceImage(_) => "reference",
            Detector::Negation(_) => "not",
            Detector::Debounce(_) => "stable",
            Detector::Constant(_) => "constant",
            Detector::Unimplemented(_) => "unimplemented",
        }
    }
}

impl From<ColorHistogramDetector> for Detector {
    fn from(d: ColorHistogramDetector) -> Self {
        Detector::ColorHistogram(d)
    }
}

impl From<ReferenceImageDetector> for Detector {
    fn from(d: ReferenceImageDetector) -> Self {
        Detector::ReferenceImage(d)
    }
}

impl From<DebounceDetector> for Detector {
    fn from(d: DebounceDetector) -> Self {
        Detector::Debounce(d)
    }
}

/// Color detection by histogram windows.
///
/// For each active channel, counts pixels within +-3 levels of the target
/// value. The detector fires when those counts, averaged over the active
/// channels, exceed `threshold` percent of the region's pixels.
#[derive(Debug, Clone)]
pub struct ColorHistogramDetector {
    /// Target level per channel; `None` ignores that channel
    target: Vec<Option<u8>>,
    /// Percentage of region pixels that must match
    threshold: f64,
    mode: ColorMode,
    region: Option<Region>,
}

impl ColorHistogramDetector {
    /// Create a detector; at least one channel must be active
    pub fn new(target: Vec<Option<u8>>, threshold: f64, mode: ColorMode) -> Result<Self> {
        if target.iter().all(Option::is_none) {
            return Err(Error::Precondition(
                "color detector needs at least one active channel".to_string(),
            ));
        }
        Ok(Self {
            target,
            threshold,
            mode,
            region: None,
        })
    }

    /// Match red, green and blue in RGBA mode
    pub fn rgb(color: [u8; 3], threshold: f64) -> Self {
        Self {
            target: color.iter().copied().map(Some).collect(),
            threshold,
            mode: ColorMode::Rgba,
            region: None,
        }
    }

    /// Match only the hue channel in HSV mode
    pub fn hue(hue: u8, threshold: f64) -> Self {
        Self {
            target: vec![Some(hue)],
            threshold,
            mode: ColorMode::Hsv,
            region: None,
        }
    }

    /// Restrict detection to a sub-region
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Percentage of pixels that must match
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Color space the histogram is taken in
    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    /// Evaluate against a frame
    pub fn detect(&self, view: &BitmapView) -> Result<bool> {
        let image = view.get_by_mode(self.mode);
        let (histogram, pixels) = match self.region {
            Some(region) => {
                let cropped = image.crop(region)?;
                (cropped.histogram(), cropped.pixel_count())
            }
            None => (image.histogram(), view.total_pixel_count()),
        };
        self.matches(&histogram, pixels)
    }

    /// Apply the window test to a precomputed histogram of `pixels` pixels
    pub fn matches(&self, histogram: &Histogram, pixels: u64) -> Result<bool> {
        let mut channels = 0u64;
        let mut total = 0u64;

        for (index, target) in self.target.iter().enumerate().take(histogram.channel_count()) {
            let Some(level) = target else {
                continue;
            };
            total += histogram.window_sum(index, *level);
            channels += 1;
        }

        if channels == 0 {
            return Err(Error::Precondition(format!(
                "no active channel of {:?} exists in {} histogram",
                self.target, self.mode
            )));
        }
        if pixels == 0 {
            return Err(Error::Precondition("color detector region has no pixels".to_string()));
        }

        let scaled = total * 100;
        let limit = self.threshold * channels as f64 * pixels as f64;

        log::trace!(
            "color {:?} ({}): implied threshold {}, configured {}",
            self.target,
            self.mode,
            scaled / (channels * pixels),
            self.threshold
        );

        Ok(scaled as f64 > limit)
    }
}

/// Whole-frame comparison against a stored reference image
#[derive(Debug, Clone)]
pub struct ReferenceImageDetector {
    reference: RgbaImage,
    threshold: f64,
}

impl ReferenceImageDetector {
    /// Compare against `reference` with the default threshold
    pub fn new(reference: DynamicImage) -> Self {
        Self {
            reference: reference.to_rgba8(),
            threshold: DEFAULT_REFERENCE_THRESHOLD,
        }
    }

    /// Load the reference image from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reference = image::open(path)?;
        log::debug!(
            "Loaded reference image {} ({}x{})",
            path.display(),
            reference.width(),
            reference.height()
        );
        Ok(Self::new(reference))
    }

    /// Override the similarity threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Difference below which frames count as matching
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Normalized average difference between the frame and the reference.
    ///
    /// 0.0 means identical; each channel of the RGBA difference contributes,
    /// so the value can exceed 1.0 for very different frames.
    pub fn difference(&self, view: &BitmapView) -> Result<f64> {
        let pixels = view.total_pixel_count();
        if pixels == 0 {
            return Err(Error::Precondition("reference comparison on an empty frame".to_string()));
        }

        let live = match view.get_by_mode(ColorMode::Rgba) {
            ModeImage::Rgba(img) => img,
            other => return Err(Error::UnsupportedMode(other.mode().to_string())),
        };
        if live.dimensions() != self.reference.dimensions() {
            return Err(Error::DimensionMismatch {
                expected: self.reference.dimensions(),
                actual: live.dimensions(),
            });
        }

        let mut diff = RgbaImage::new(live.width(), live.height());
        for ((a, b), out) in live.pixels().zip(self.reference.pixels()).zip(diff.pixels_mut()) {
            *out = Rgba([
                a[0].abs_diff(b[0]),
                a[1].abs_diff(b[1]),
                a[2].abs_diff(b[2]),
                a[3].abs_diff(b[3]),
            ]);
        }

        let histogram = Histogram::from(imageproc::stats::histogram(&diff));
        Ok(histogram.weighted_level_sum() as f64 / pixels as f64 / 255.0)
    }

    /// Evaluate against a frame
    pub fn detect(&self, view: &BitmapView) -> Result<bool> {
        let difference = self.difference(view)?;
        log::trace!("reference difference {:.4} (threshold {})", difference, self.threshold);
        Ok(difference < self.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> BitmapView {
        BitmapView::new(DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color))))
    }

    fn red_only(level: u8, threshold: f64) -> ColorHistogramDetector {
        ColorHistogramDetector::new(vec![Some(level), None, None], threshold, ColorMode::Rgba).unwrap()
    }

    #[test]
    fn test_color_scenario_above_threshold() {
        // 100 pixels in bin 7: 100 * 100 = 10000 > 50 * 1 * 100
        let view = solid(10, 10, [7, 0, 0, 255]);
        assert!(red_only(7, 50.0).detect(&view).unwrap());
    }

    #[test]
    fn test_color_scenario_below_threshold() {
        // 10000 < 150 * 1 * 100
        let view = solid(10, 10, [7, 0, 0, 255]);
        assert!(!red_only(7, 150.0).detect(&view).unwrap());
    }

    #[test]
    fn test_color_is_strictly_greater() {
        // 10000 == 100 * 1 * 100 is not a match
        let view = solid(10, 10, [7, 0, 0, 255]);
        assert!(!red_only(7, 100.0).detect(&view).unwrap());
        assert!(red_only(7, 99.9).detect(&view).unwrap());
    }

    #[test]
    fn test_color_window_tolerance() {
        let view = solid(10, 10, [10, 0, 0, 255]);
        assert!(red_only(7, 50.0).detect(&view).unwrap());
        assert!(red_only(13, 50.0).detect(&view).unwrap());
        assert!(!red_only(14, 50.0).detect(&view).unwrap());
        assert!(!red_only(6, 50.0).detect(&view).unwrap());
    }

    #[test]
    fn test_color_threshold_monotonic() {
        let view = solid(8, 8, [120, 40, 200, 255]);
        let mut was_true = false;
        for threshold in (0..=200).rev().map(|t| t as f64) {
            let d = ColorHistogramDetector::rgb([121, 38, 205], threshold);
            let hit = d.detect(&view).unwrap();
            if was_true {
                assert!(hit, "lowering threshold to {} lost a match", threshold);
            }
            was_true |= hit;
        }
        assert!(was_true);
    }

    #[test]
    fn test_color_averages_channels() {
        // Red matches fully, green not at all: average 50%
        let view = solid(10, 10, [200, 0, 0, 255]);
        let d = ColorHistogramDetector::new(vec![Some(200), Some(100)], 49.0, ColorMode::Rgb).unwrap();
        assert!(d.detect(&view).unwrap());
        let d = ColorHistogramDetector::new(vec![Some(200), Some(100)], 50.0, ColorMode::Rgb).unwrap();
        assert!(!d.detect(&view).unwrap());
    }

    #[test]
    fn test_hue_detector() {
        // Pure green has hue 85
        let view = solid(4, 4, [0, 255, 0, 255]);
        assert!(ColorHistogramDetector::hue(85, 50.0).detect(&view).unwrap());
        assert!(!ColorHistogramDetector::hue(121, 50.0).detect(&view).unwrap());
    }

    #[test]
    fn test_color_region() {
        let mut img = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        for x in 0..10 {
            for y in 0..10 {
                img.put_pixel(x, y, Rgba([254, 215, 0, 255]));
            }
        }
        let view = BitmapView::new(DynamicImage::ImageRgba8(img));

        let whole = ColorHistogramDetector::rgb([254, 215, 0], 95.0);
        assert!(!whole.detect(&view).unwrap());

        let left = whole.clone().with_region(Region::new(0, 0, 10, 10));
        assert!(left.detect(&view).unwrap());

        let outside = whole.with_region(Region::new(15, 0, 25, 10));
        assert!(matches!(outside.detect(&view), Err(Error::InvalidRegion { .. })));
    }

    #[test]
    fn test_color_requires_active_channel() {
        let err = ColorHistogramDetector::new(vec![None, None], 50.0, ColorMode::Rgb).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_color_channel_beyond_mode() {
        // Luma has one channel, so only the second target would be active
        let d = ColorHistogramDetector::new(vec![None, Some(10)], 50.0, ColorMode::Luma).unwrap();
        let view = solid(2, 2, [10, 10, 10, 255]);
        assert!(matches!(d.detect(&view), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_reference_identical() {
        let frame = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 9, Rgba([30, 60, 90, 255])));
        let d = ReferenceImageDetector::new(frame.clone());
        let view = BitmapView::new(frame);
        assert_eq!(d.difference(&view).unwrap(), 0.0);
        assert!(d.detect(&view).unwrap());
    }

    #[test]
    fn test_reference_different() {
        let reference = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let d = ReferenceImageDetector::new(reference);

        // Red channel off by 51 on every pixel: 51 / 255 = 0.2
        let view = solid(4, 4, [51, 0, 0, 255]);
        assert!((d.difference(&view).unwrap() - 0.2).abs() < 1e-9);
        assert!(!d.detect(&view).unwrap());

        // Off by 12: 0.047
        let view = solid(4, 4, [12, 0, 0, 255]);
        assert!(d.detect(&view).unwrap());
        assert!(!d.clone().with_threshold(0.01).detect(&view).unwrap());
    }

    #[test]
    fn test_reference_dimension_mismatch() {
        let reference = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        let d = ReferenceImageDetector::new(reference);
        let view = solid(5, 4, [0, 0, 0, 0]);
        assert!(matches!(
            d.detect(&view),
            Err(Error::DimensionMismatch { expected: (4, 4), actual: (5, 4) })
        ));
    }

    #[test]
    fn test_reference_empty_frame() {
        let d = ReferenceImageDetector::new(DynamicImage::ImageRgba8(RgbaImage::new(0, 0)));
        let view = BitmapView::new(DynamicImage::ImageRgba8(RgbaImage::new(0, 0)));
        assert!(matches!(d.detect(&view), Err(Error::Precondition(_))));
    }

    #[test]
    fn test_reference_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clear_frame.png");
        RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let d = ReferenceImageDetector::load(&path).unwrap();
        assert!(d.detect(&solid(3, 3, [1, 2, 3, 255])).unwrap());

        assert!(matches!(
            ReferenceImageDetector::load(dir.path().join("missing.png")),
            Err(Error::Image(_))
        ));
    }

    #[test]
    fn test_negation_law() {
        let frames = [solid(5, 5, [7, 0, 0, 255]), solid(5, 5, [90, 0, 0, 255])];
        for view in &frames {
            let mut plain = Detector::from(red_only(7, 50.0));
            let mut negated = Detector::from(red_only(7, 50.0)).negate();
            assert_eq!(negated.evaluate(view).unwrap(), !plain.evaluate(view).unwrap());
        }
    }

    #[test]
    fn test_constant_and_unimplemented() {
        let view = solid(1, 1, [0, 0, 0, 255]);
        assert!(Detector::Constant(true).evaluate(&view).unwrap());
        assert!(!Detector::Constant(false).evaluate(&view).unwrap());

        let mut todo = Detector::Unimplemented("results screen".to_string());
        assert!(matches!(
            todo.evaluate(&view),
            Err(Error::NotImplemented(name)) if name == "results screen"
        ));
        // Errors pass through negation instead of flipping to true
        assert!(Detector::Unimplemented("x".to_string()).negate().evaluate(&view).is_err());
    }
}
