//! Record payload → fixed-size 8-bit image and integer label.

use crate::norm::resize;
use crate::types::{BurnDatasetError, DatasetResult, Example};
use data_contracts::ExampleRecord;
use image::DynamicImage;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeConfig {
    /// Square side the decoded image is resized to before augmentation.
    pub dim_pre: u32,
    /// 1 (luma) or 3 (RGB).
    pub channels: u8,
}

pub fn decode_record(record: ExampleRecord, cfg: &DecodeConfig, path: &Path) -> DatasetResult<Example> {
    let (bytes, label) = record.into_parts(path)?;
    let image = decode_image(&bytes, cfg, path)?;
    Ok(Example { image, label })
}

pub fn decode_image(bytes: &[u8], cfg: &DecodeConfig, path: &Path) -> DatasetResult<DynamicImage> {
    let dynamic = image::load_from_memory(bytes).map_err(|source| BurnDatasetError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let img = match cfg.channels {
        1 => DynamicImage::ImageLuma8(dynamic.to_luma8()),
        3 => DynamicImage::ImageRgb8(dynamic.to_rgb8()),
        other => return Err(BurnDatasetError::Channels(other)),
    };
    Ok(resize(&img, cfg.dim_pre, cfg.dim_pre))
}
