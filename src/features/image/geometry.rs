//! Crop geometry.
//!
//! Crop rectangles live in display units (the size the image is shown at);
//! rendering happens in source pixels. Everything here is pure arithmetic.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Width of every normalized image.
pub const OUTPUT_WIDTH: u32 = 800;

/// Fraction of the governing display dimension the initial crop covers.
const INITIAL_COVERAGE: f64 = 0.9;

/// Aspect ratio the crop is locked to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AspectRatio {
    /// 1:1, rendered at 800x800.
    #[default]
    Square,
    /// 4:3, rendered at 800x600.
    FourThree,
}

impl AspectRatio {
    /// Width divided by height.
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Square => 1.0,
            Self::FourThree => 4.0 / 3.0,
        }
    }

    /// Fixed output size: 800x800 for square, 800x600 otherwise.
    #[must_use]
    pub const fn output_dimensions(self) -> (u32, u32) {
        match self {
            Self::Square => (OUTPUT_WIDTH, OUTPUT_WIDTH),
            Self::FourThree => (OUTPUT_WIDTH, 600),
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Square => write!(f, "1:1"),
            Self::FourThree => write!(f, "4:3"),
        }
    }
}

/// Crop rectangle in display units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Parse `x,y,width,height`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if the string is not four numbers.
    pub fn parse(raw: &str) -> Result<Self, CatalogError> {
        let parts: Vec<f64> = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CatalogError::Validation(format!("invalid crop rectangle: '{raw}'")))?;

        match parts.as_slice() {
            [x, y, w, h] => Ok(Self::new(*x, *y, *w, *h)),
            _ => Err(CatalogError::Validation(format!(
                "crop rectangle needs x,y,width,height: '{raw}'"
            ))),
        }
    }

    #[must_use]
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// Clamp into a `width` x `height` display area.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for non-finite or non-positive sizes,
    /// or a rectangle entirely outside the display.
    pub fn clamped_to(&self, width: f64, height: f64) -> Result<Self, CatalogError> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width <= 0.0 || self.height <= 0.0 {
            return Err(CatalogError::Validation(format!(
                "crop rectangle must have a positive size: {self:?}"
            )));
        }

        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = (self.x + self.width).clamp(0.0, width);
        let y1 = (self.y + self.height).clamp(0.0, height);

        if x1 - x0 <= 0.0 || y1 - y0 <= 0.0 {
            return Err(CatalogError::Validation(
                "crop rectangle lies outside the image".to_string(),
            ));
        }

        Ok(Self::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Centered crop covering 90% of the governing display dimension at `aspect`.
///
/// The width is tried first; if the resulting height does not fit, the
/// height governs instead.
#[must_use]
pub fn initial_crop(display_width: f64, display_height: f64, aspect: AspectRatio) -> CropRect {
    let ratio = aspect.value();

    let mut width = display_width * INITIAL_COVERAGE;
    let mut height = width / ratio;
    let max_height = display_height * INITIAL_COVERAGE;
    if height > max_height {
        height = max_height;
        width = height * ratio;
    }

    CropRect::new(
        (display_width - width) / 2.0,
        (display_height - height) / 2.0,
        width,
        height,
    )
}

/// Rectangle in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Natural size of an image and the size it is displayed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub natural_width: u32,
    pub natural_height: u32,
    pub display_width: f64,
    pub display_height: f64,
}

impl DisplayGeometry {
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if any dimension is zero, negative or not finite.
    pub fn new(
        natural_width: u32,
        natural_height: u32,
        display_width: f64,
        display_height: f64,
    ) -> Result<Self, CatalogError> {
        let display_ok = display_width.is_finite()
            && display_height.is_finite()
            && display_width > 0.0
            && display_height > 0.0;
        if natural_width == 0 || natural_height == 0 || !display_ok {
            return Err(CatalogError::Validation(format!(
                "invalid image geometry: natural {natural_width}x{natural_height}, \
                 display {display_width}x{display_height}"
            )));
        }

        Ok(Self {
            natural_width,
            natural_height,
            display_width,
            display_height,
        })
    }

    /// Geometry of an image displayed at its natural size.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` if either dimension is zero.
    pub fn natural(width: u32, height: u32) -> Result<Self, CatalogError> {
        Self::new(width, height, f64::from(width), f64::from(height))
    }

    /// Natural-to-displayed scale on each axis.
    #[must_use]
    pub fn scale(&self) -> (f64, f64) {
        (
            f64::from(self.natural_width) / self.display_width,
            f64::from(self.natural_height) / self.display_height,
        )
    }

    /// Map a display-unit crop into source pixels, clamped to the image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_source(&self, rect: &CropRect) -> PixelRegion {
        let (sx, sy) = self.scale();
        let max_x = f64::from(self.natural_width);
        let max_y = f64::from(self.natural_height);

        let x0 = (rect.x * sx).round().clamp(0.0, max_x - 1.0);
        let y0 = (rect.y * sy).round().clamp(0.0, max_y - 1.0);
        let x1 = ((rect.x + rect.width) * sx).round().clamp(x0 + 1.0, max_x);
        let y1 = ((rect.y + rect.height) * sy).round().clamp(y0 + 1.0, max_y);

        PixelRegion {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_output_dimensions() {
        assert_eq!(AspectRatio::Square.output_dimensions(), (800, 800));
        assert_eq!(AspectRatio::FourThree.output_dimensions(), (800, 600));
    }

    #[test]
    fn test_initial_crop_width_governs() {
        // Tall image: 90% of the width fits vertically.
        let crop = initial_crop(400.0, 1000.0, AspectRatio::Square);
        assert!((crop.width - 360.0).abs() < EPS);
        assert!((crop.height - 360.0).abs() < EPS);
        assert!((crop.x - 20.0).abs() < EPS);
        assert!((crop.y - 320.0).abs() < EPS);
    }

    #[test]
    fn test_initial_crop_height_governs() {
        let crop = initial_crop(1000.0, 500.0, AspectRatio::Square);
        assert!((crop.height - 450.0).abs() < EPS);
        assert!((crop.width - 450.0).abs() < EPS);
        assert!((crop.x - 275.0).abs() < EPS);
        assert!((crop.y - 25.0).abs() < EPS);
    }

    #[test]
    fn test_initial_crop_keeps_ratio_and_centre() {
        for (w, h) in [(300.0, 200.0), (200.0, 300.0), (640.0, 480.0), (1.0, 1000.0)] {
            for aspect in [AspectRatio::Square, AspectRatio::FourThree] {
                let crop = initial_crop(w, h, aspect);
                assert!((crop.aspect() - aspect.value()).abs() < 1e-9);
                assert!((crop.x + crop.width / 2.0 - w / 2.0).abs() < 1e-9);
                assert!((crop.y + crop.height / 2.0 - h / 2.0).abs() < 1e-9);
                assert!(crop.width <= w * 0.9 + EPS);
                assert!(crop.height <= h * 0.9 + EPS);
            }
        }
    }

    #[test]
    fn test_to_source_scales_linearly() {
        let geometry = DisplayGeometry::new(3000, 2000, 750.0, 500.0).unwrap();
        let region = geometry.to_source(&CropRect::new(100.0, 50.0, 200.0, 150.0));

        assert_eq!(
            region,
            PixelRegion {
                x: 400,
                y: 200,
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn test_to_source_full_frame() {
        let geometry = DisplayGeometry::natural(3000, 2000).unwrap();
        let region = geometry.to_source(&CropRect::new(0.0, 0.0, 3000.0, 2000.0));
        assert_eq!(region.width, 3000);
        assert_eq!(region.height, 2000);
    }

    #[test]
    fn test_to_source_clamps_to_image() {
        let geometry = DisplayGeometry::natural(100, 100).unwrap();
        let region = geometry.to_source(&CropRect::new(90.0, 90.0, 50.0, 50.0));
        assert_eq!(region.x + region.width, 100);
        assert_eq!(region.y + region.height, 100);
    }

    #[test]
    fn test_clamped_to_display() {
        let rect = CropRect::new(-10.0, 5.0, 50.0, 500.0);
        let clamped = rect.clamped_to(100.0, 100.0).unwrap();
        assert_eq!(clamped, CropRect::new(0.0, 5.0, 40.0, 95.0));

        assert!(CropRect::new(0.0, 0.0, 0.0, 10.0).clamped_to(100.0, 100.0).is_err());
        assert!(CropRect::new(200.0, 0.0, 10.0, 10.0).clamped_to(100.0, 100.0).is_err());
        assert!(CropRect::new(f64::NAN, 0.0, 10.0, 10.0).clamped_to(100.0, 100.0).is_err());
    }

    #[test]
    fn test_parse_crop() {
        assert_eq!(
            CropRect::parse("1, 2,3,4.5").unwrap(),
            CropRect::new(1.0, 2.0, 3.0, 4.5)
        );
        assert!(CropRect::parse("1,2,3").is_err());
        assert!(CropRect::parse("a,b,c,d").is_err());
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(DisplayGeometry::new(0, 10, 10.0, 10.0).is_err());
        assert!(DisplayGeometry::new(10, 10, 0.0, 10.0).is_err());
    }
}
