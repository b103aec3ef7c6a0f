//! Spatial availability gate.
//!
//! A greyscale mask centred on the origin of the parent frame marks where the
//! sensor can report.  A zero pixel blocks the measurement; any other value,
//! a position off the mask, or no mask at all lets it through.
//!
//! Grid lookup for a planar position `(x, y)`:
//!
//! ```text
//! col = floor(x / scale) + width  / 2
//! row = floor(y / scale) + height / 2
//! ```
//!
//! The row index addresses image rows top to bottom, unflipped.

use std::path::Path;

use image::GrayImage;
use odosim_types::{OdomError, Vec3};
use tracing::info;

/// Decoded mask pixels plus the world-units-per-pixel scale.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityMask {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
    scale: f64,
}

impl AvailabilityMask {
    /// Build from row-major pixel data.
    ///
    /// # Errors
    ///
    /// [`OdomError::InvalidMaskScale`] when `scale` is not a positive finite
    /// number, [`OdomError::InvalidMask`] when `pixels` does not hold
    /// `width * height` values.
    pub fn new(
        width: usize,
        height: usize,
        pixels: Vec<u8>,
        scale: f64,
    ) -> Result<Self, OdomError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(OdomError::InvalidMaskScale(scale));
        }
        if pixels.len() != width * height {
            return Err(OdomError::InvalidMask(format!(
                "expected {} pixels for {width}x{height}, got {}",
                width * height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            scale,
        })
    }

    pub fn from_gray_image(image: GrayImage, scale: f64) -> Result<Self, OdomError> {
        let (w, h) = image.dimensions();
        Self::new(w as usize, h as usize, image.into_raw(), scale)
    }

    /// Decode an image file and convert it to 8-bit greyscale.
    ///
    /// # Errors
    ///
    /// [`OdomError::MaskLoad`] when the file cannot be read or decoded.
    pub fn load(path: impl AsRef<Path>, scale: f64) -> Result<Self, OdomError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| OdomError::MaskLoad {
                path: path.display().to_string(),
                details: e.to_string(),
            })?
            .to_luma8();
        let mask = Self::from_gray_image(image, scale)?;
        info!(
            path = %path.display(),
            width = mask.width,
            height = mask.height,
            scale,
            "loaded covariance image"
        );
        Ok(mask)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Grid cell `(col, row)` for a planar position, or `None` off the mask.
    pub fn cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        Some((
            grid_index(x / self.scale, self.width)?,
            grid_index(y / self.scale, self.height)?,
        ))
    }

    /// Pixel intensity under a planar position, or `None` off the mask.
    pub fn intensity(&self, x: f64, y: f64) -> Option<u8> {
        self.cell(x, y)
            .map(|(col, row)| self.pixels[row * self.width + col])
    }
}

/// Index of `cells` along an axis of `len` cells centred on the origin.
/// Range-checked in `f64` so huge or non-finite inputs land off the grid.
fn grid_index(cells: f64, len: usize) -> Option<usize> {
    let index = cells.floor() + (len / 2) as f64;
    (index >= 0.0 && index < len as f64).then_some(index as usize)
}

/// Decides whether a measurement is observable at a position.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityGate {
    mask: Option<AvailabilityMask>,
}

impl AvailabilityGate {
    /// A gate that is always open.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_mask(mask: AvailabilityMask) -> Self {
        Self { mask: Some(mask) }
    }

    pub fn mask(&self) -> Option<&AvailabilityMask> {
        self.mask.as_ref()
    }

    /// `false` only when the position lies on a zero pixel of the mask.
    pub fn is_available(&self, position: Vec3) -> bool {
        match &self.mask {
            Some(mask) => mask.intensity(position.x, position.y) != Some(0),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// 4×4 mask, all ones except one blocked cell at (col 2, row 1).
    fn mask_with_hole() -> AvailabilityMask {
        let mut pixels = vec![1u8; 16];
        pixels[4 + 2] = 0;
        AvailabilityMask::new(4, 4, pixels, 0.5).unwrap()
    }

    #[test]
    fn no_mask_is_always_available() {
        let gate = AvailabilityGate::open();
        assert!(gate.is_available(Vec3::new(1e6, -1e6, 0.0)));
    }

    #[test]
    fn origin_maps_to_centre_cell() {
        let mask = mask_with_hole();
        assert_eq!(mask.cell(0.0, 0.0), Some((2, 2)));
        assert_eq!(mask.cell(-0.01, -0.01), Some((1, 1)));
    }

    #[test]
    fn zero_pixel_blocks_measurement() {
        let gate = AvailabilityGate::with_mask(mask_with_hole());
        // col = floor(0.2 / 0.5) + 2 = 2; row = floor(-0.3 / 0.5) + 2 = 1
        assert!(!gate.is_available(Vec3::new(0.2, -0.3, 5.0)));
        assert!(gate.is_available(Vec3::new(0.2, 0.3, 5.0)));
    }

    #[test]
    fn outside_mask_is_available() {
        let mask = AvailabilityMask::new(2, 2, vec![0; 4], 1.0).unwrap();
        let gate = AvailabilityGate::with_mask(mask);
        assert!(!gate.is_available(Vec3::new(0.5, 0.5, 0.0)));
        assert!(gate.is_available(Vec3::new(10.0, 0.0, 0.0)));
        assert!(gate.is_available(Vec3::new(0.0, -1.5, 0.0)));
    }

    #[test]
    fn huge_positions_fall_off_the_mask() {
        let mask = AvailabilityMask::new(4, 4, vec![0; 16], 1.0).unwrap();
        let gate = AvailabilityGate::with_mask(mask);
        assert!(!gate.is_available(Vec3::zero()));
        for far in [1e19, -1e19, f64::MAX, f64::MIN] {
            assert!(gate.is_available(Vec3::new(far, 0.0, 0.0)), "x = {far}");
            assert!(gate.is_available(Vec3::new(0.0, far, 0.0)), "y = {far}");
        }
        assert_eq!(mask_with_hole().cell(1e19, -1e19), None);
    }

    #[test]
    fn nonzero_intensity_is_available() {
        let gate = AvailabilityGate::with_mask(AvailabilityMask::new(1, 1, vec![17], 1.0).unwrap());
        assert!(gate.is_available(Vec3::zero()));
    }

    #[test]
    fn rejects_bad_scale_and_size() {
        assert_eq!(
            AvailabilityMask::new(2, 2, vec![0; 4], 0.0),
            Err(OdomError::InvalidMaskScale(0.0))
        );
        assert!(matches!(
            AvailabilityMask::new(2, 2, vec![0; 3], 1.0),
            Err(OdomError::InvalidMask(_))
        ));
    }

    #[test]
    fn load_reads_png_from_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("mask.png");
        let mut img = GrayImage::from_pixel(3, 3, Luma([255]));
        img.put_pixel(1, 1, Luma([0]));
        img.save(&path).expect("save png");

        let mask = AvailabilityMask::load(&path, 2.0).expect("load");
        assert_eq!((mask.width(), mask.height()), (3, 3));
        assert_eq!(mask.intensity(0.5, 0.5), Some(0));
        assert_eq!(mask.intensity(-1.0, -1.0), Some(255));
    }

    #[test]
    fn load_missing_file_is_error() {
        let err = AvailabilityMask::load("/definitely/not/here.png", 1.0).unwrap_err();
        assert!(matches!(err, OdomError::MaskLoad { .. }));
    }
}
