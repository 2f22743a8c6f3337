//! Geometric transform table, train-time augmentation policy, and TTA selection.

use crate::types::{BurnDatasetError, DatasetResult};
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use rand::Rng;

/// Fraction of each side kept after the 45°-family rotations.
pub const ROTATED_CROP_FRACTION: f64 = 0.7;

/// Deterministic geometric transforms; the order of [`Transform::ALL`] is significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Identity,
    FlipHorizontal,
    FlipVertical,
    Rotate90,
    Rotate180,
    Rotate270,
    Rotate45Crop,
    Rotate135Crop,
    Rotate225Crop,
    Rotate315Crop,
}

impl Transform {
    pub const ALL: [Transform; 10] = [
        Transform::Identity,
        Transform::FlipHorizontal,
        Transform::FlipVertical,
        Transform::Rotate90,
        Transform::Rotate180,
        Transform::Rotate270,
        Transform::Rotate45Crop,
        Transform::Rotate135Crop,
        Transform::Rotate225Crop,
        Transform::Rotate315Crop,
    ];

    /// Number of non-identity transforms.
    pub const MAX_AUG: usize = Self::ALL.len() - 1;

    /// Position in [`Transform::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::FlipHorizontal => "flip_lr",
            Transform::FlipVertical => "flip_ud",
            Transform::Rotate90 => "rot90",
            Transform::Rotate180 => "rot180",
            Transform::Rotate270 => "rot270",
            Transform::Rotate45Crop => "rot45_crop",
            Transform::Rotate135Crop => "rot135_crop",
            Transform::Rotate225Crop => "rot225_crop",
            Transform::Rotate315Crop => "rot315_crop",
        }
    }

    /// Rotations are counter-clockwise; `image` names its quarter turns clockwise.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        match self {
            Transform::Identity => img.clone(),
            Transform::FlipHorizontal => img.fliph(),
            Transform::FlipVertical => img.flipv(),
            Transform::Rotate90 => img.rotate270(),
            Transform::Rotate180 => img.rotate180(),
            Transform::Rotate270 => img.rotate90(),
            Transform::Rotate45Crop => rotate_crop(img, 45.0),
            Transform::Rotate135Crop => rotate_crop(img, 135.0),
            Transform::Rotate225Crop => rotate_crop(img, 225.0),
            Transform::Rotate315Crop => rotate_crop(img, 315.0),
        }
    }
}

/// TTA variants for `tta_number`: identity first, then the next `tta_number` transforms.
pub fn tta_transforms(tta_number: usize) -> DatasetResult<&'static [Transform]> {
    if tta_number > Transform::MAX_AUG {
        return Err(BurnDatasetError::Other(format!(
            "tta_number {tta_number} exceeds the {} available transforms",
            Transform::MAX_AUG
        )));
    }
    Ok(&Transform::ALL[..=tta_number])
}

/// Applies at most one transform per example.
///
/// A draw `d` from `[0, maxval)` selects `ALL[d + 1]` when `d < aug_number` and
/// identity otherwise, so each transform fires with probability
/// `aug_percentage / aug_number` and identity with `1 - aug_percentage`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugPolicy {
    aug_number: usize,
    aug_percentage: f64,
    maxval: u32,
}

impl AugPolicy {
    pub fn new(aug_number: usize, aug_percentage: f64) -> DatasetResult<Self> {
        if aug_number > Transform::MAX_AUG {
            return Err(BurnDatasetError::Other(format!(
                "aug_number {aug_number} exceeds the {} available transforms",
                Transform::MAX_AUG
            )));
        }
        if !(aug_percentage > 0.0 && aug_percentage <= 1.0) {
            return Err(BurnDatasetError::Other(format!(
                "aug_percentage must be in (0, 1], got {aug_percentage}"
            )));
        }
        let maxval = (aug_number as f64 / aug_percentage).round_ties_even() as u32;
        Ok(Self {
            aug_number,
            aug_percentage,
            maxval,
        })
    }

    pub fn disabled() -> Self {
        Self {
            aug_number: 0,
            aug_percentage: 1.0,
            maxval: 0,
        }
    }

    pub fn aug_number(&self) -> usize {
        self.aug_number
    }

    pub fn maxval(&self) -> u32 {
        self.maxval
    }

    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Transform {
        if self.aug_number == 0 {
            return Transform::Identity;
        }
        let draw = rng.random_range(0..self.maxval) as usize;
        if draw < self.aug_number {
            Transform::ALL[draw + 1]
        } else {
            Transform::Identity
        }
    }

    pub fn describe(&self) -> String {
        let names: Vec<&str> = Transform::ALL[1..=self.aug_number]
            .iter()
            .map(Transform::name)
            .collect();
        format!(
            "aug_number={} aug_percentage={:.2} maxval={} transforms=[{}]",
            self.aug_number,
            self.aug_percentage,
            self.maxval,
            names.join(",")
        )
    }
}

/// Counter-clockwise rotation about the image centre, nearest-neighbour sampling,
/// zero fill outside the source. Output keeps the input size.
pub fn rotate_about_centre<P: Pixel>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    degrees: f64,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (w, h) = src.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = (w as f64 - 1.0) / 2.0;
    let cy = (h as f64 - 1.0) / 2.0;
    let mut out = ImageBuffer::new(w, h);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let sx = (cx + cos * dx - sin * dy).round();
        let sy = (cy + sin * dx + cos * dy).round();
        if sx >= 0.0 && sy >= 0.0 && sx < w as f64 && sy < h as f64 {
            *px = *src.get_pixel(sx as u32, sy as u32);
        }
    }
    out
}

/// Keep the central `fraction` of each side.
pub fn central_crop(img: &DynamicImage, fraction: f64) -> DynamicImage {
    let start = |side: u32| ((side as f64 - side as f64 * fraction) / 2.0) as u32;
    let (w, h) = img.dimensions();
    let (x0, y0) = (start(w), start(h));
    img.crop_imm(x0, y0, (w - 2 * x0).max(1), (h - 2 * y0).max(1))
}

fn rotate_crop(img: &DynamicImage, degrees: f64) -> DynamicImage {
    let rotated = match img {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(rotate_about_centre(buf, degrees)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(rotate_about_centre(buf, degrees)),
        other => DynamicImage::ImageRgb8(rotate_about_centre(&other.to_rgb8(), degrees)),
    };
    central_crop(&rotated, ROTATED_CROP_FRACTION)
}
