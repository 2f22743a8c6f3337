//! Resize and normalization into model input.

use crate::types::{BurnDatasetError, DatasetResult, Example, NormalizedExample};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormConfig {
    /// Final square side passed to the model.
    pub dim: u32,
    /// Store `255 - v` instead of `v`.
    pub inverted: bool,
}

/// Bilinear resize that keeps the pixel format; returns a clone when the size already matches.
pub fn resize(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    img.resize_exact(width, height, FilterType::Triangle)
}

pub fn normalize(example: &Example, cfg: &NormConfig) -> DatasetResult<NormalizedExample> {
    let img = resize(&example.image, cfg.dim, cfg.dim);
    Ok(NormalizedExample {
        image_chw: to_chw_unit(&img, cfg.inverted)?,
        label: example.label,
    })
}

/// HWC u8 → CHW f32 scaled to `[0, 1]`, optionally inverted first.
pub fn to_chw_unit(img: &DynamicImage, inverted: bool) -> DatasetResult<Vec<f32>> {
    let (data, ch): (&[u8], usize) = match img {
        DynamicImage::ImageLuma8(buf) => (buf.as_raw(), 1),
        DynamicImage::ImageRgb8(buf) => (buf.as_raw(), 3),
        other => return Err(BurnDatasetError::Channels(other.color().channel_count())),
    };
    let plane = data.len() / ch;
    let mut out = vec![0.0f32; data.len()];
    for (i, px) in data.chunks_exact(ch).enumerate() {
        for (c, v) in px.iter().enumerate() {
            let mut v = *v as f32;
            if inverted {
                v = 255.0 - v;
            }
            out[c * plane + i] = v / 255.0;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient(dim: u32) -> RgbImage {
        RgbImage::from_fn(dim, dim, |x, y| {
            Rgb([(x * 30 + y * 7) as u8, (x * 30 + y * 7 + 50) as u8, (x * 30 + y * 7 + 100) as u8])
        })
    }

    #[test]
    fn same_size_without_inversion_is_plain_scaling() {
        let img = gradient(4);
        let ex = Example {
            image: DynamicImage::ImageRgb8(img.clone()),
            label: 2,
        };
        let out = normalize(
            &ex,
            &NormConfig {
                dim: 4,
                inverted: false,
            },
        )
        .unwrap();
        assert_eq!(out.label, 2);
        let plane = 16;
        for (x, y, px) in img.enumerate_pixels() {
            for c in 0..3 {
                let expected = px[c] as f32 / 255.0;
                let got = out.image_chw[c * plane + (y * 4 + x) as usize];
                assert!((expected - got).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn values_stay_in_unit_range_with_and_without_inversion() {
        let img = RgbImage::from_fn(6, 6, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let ex = Example {
            image: DynamicImage::ImageRgb8(img),
            label: 0,
        };
        for inverted in [false, true] {
            let out = normalize(&ex, &NormConfig { dim: 9, inverted }).unwrap();
            assert_eq!(out.image_chw.len(), 9 * 9 * 3);
            assert!(out.image_chw.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn inversion_flips_intensity() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([51])));
        let chw = to_chw_unit(&img, true).unwrap();
        assert!((chw[0] - 204.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn resize_keeps_pixel_format() {
        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(3, 5, |x, _| Luma([x as u8])));
        let out = resize(&gray, 7, 7);
        assert_eq!(out.dimensions(), (7, 7));
        assert!(out.as_luma8().is_some());
        assert_eq!(out.as_bytes().len(), 49);
    }

    #[test]
    fn other_pixel_formats_are_rejected() {
        let rgba = DynamicImage::new_rgba8(2, 2);
        assert!(matches!(
            to_chw_unit(&rgba, false),
            Err(BurnDatasetError::Channels(4))
        ));
    }
}
