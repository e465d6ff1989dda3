//! Contain-fit arithmetic for positioning a page image inside a viewport
//! while preserving its aspect ratio.

use crate::geometry::{PageSize, Point};
use anyhow::{Context, Result, bail};
use std::path::Path;

/// Where and how large the page image ends up inside its container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageLayout {
    /// Size the image is drawn at after fitting.
    pub rendered: PageSize,
    /// Top-left corner of the drawn image relative to the container, centering
    /// it on the unconstrained axis.
    pub offset: Point,
}

/// Scale `source` to the largest size that fits entirely inside `container`.
///
/// When the source aspect ratio exceeds the container's, width is the
/// constraining dimension, otherwise height is.
pub fn contain_fit(source: PageSize, container: PageSize) -> Result<ImageLayout> {
    if !source.is_positive() {
        bail!(
            "Image size must be positive to fit, got {}x{}",
            source.width,
            source.height
        );
    }
    if !container.is_positive() {
        bail!(
            "Container size must be positive, got {}x{}",
            container.width,
            container.height
        );
    }

    let source_aspect = source.width / source.height;
    let container_aspect = container.width / container.height;
    // Multiply before dividing so integer-friendly sizes scale exactly.
    let rendered = if source_aspect > container_aspect {
        PageSize::new(container.width, container.width * source.height / source.width)
    } else {
        PageSize::new(container.height * source.width / source.height, container.height)
    };
    let offset = Point::new(
        (container.width - rendered.width) / 2.0,
        (container.height - rendered.height) / 2.0,
    );

    Ok(ImageLayout { rendered, offset })
}

/// Natural pixel dimensions of an image file, without decoding pixel data.
pub fn probe_image_size(path: &Path) -> Result<PageSize> {
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("Reading image dimensions from {}", path.display()))?;
    Ok(PageSize::new(width as f32, height as f32))
}
