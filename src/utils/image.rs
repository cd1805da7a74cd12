//! Utility functions for image loading and dataset inspection.

use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use crate::core::errors::{PackError, PackResult};
use image::{ColorType, DynamicImage};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Loads an image file in any supported format.
///
/// # Errors
///
/// Returns [`PackError::ImageDecode`] carrying the path if the file cannot be
/// read or decoded.
pub fn load_image(path: &Path) -> PackResult<DynamicImage> {
    image::open(path).map_err(|e| PackError::image_decode(path, e))
}

/// Size and colour statistics of a set of source images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionSurvey {
    /// Number of images inspected.
    pub images: usize,
    /// Largest height seen.
    pub max_height: u32,
    /// Largest width seen.
    pub max_width: u32,
    /// Images whose pixels are not 8-bit RGB (grayscale, palette, alpha...).
    pub non_rgb: Vec<PathBuf>,
}

/// Inspects every image and reports the largest dimensions and non-RGB files.
///
/// Useful for choosing canvas dimensions before packaging. Images are decoded
/// in parallel once the list exceeds a small threshold.
pub fn survey_dimensions(paths: &[PathBuf]) -> PackResult<DimensionSurvey> {
    let inspect = |path: &PathBuf| -> PackResult<(u32, u32, bool)> {
        let image = load_image(path)?;
        Ok((
            image.width(),
            image.height(),
            image.color() != ColorType::Rgb8,
        ))
    };

    let stats: Vec<(u32, u32, bool)> = if paths.len() > DEFAULT_PARALLEL_THRESHOLD {
        paths.par_iter().map(inspect).collect::<PackResult<_>>()?
    } else {
        paths.iter().map(inspect).collect::<PackResult<_>>()?
    };

    let mut survey = DimensionSurvey {
        images: paths.len(),
        ..DimensionSurvey::default()
    };
    for (path, (width, height, non_rgb)) in paths.iter().zip(stats) {
        survey.max_width = survey.max_width.max(width);
        survey.max_height = survey.max_height.max(height);
        if non_rgb {
            survey.non_rgb.push(path.clone());
        }
    }
    Ok(survey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_survey_reports_max_dimensions_and_non_rgb() {
        let dir = TempDir::new().unwrap();
        let wide = dir.path().join("wide_1.png");
        let tall = dir.path().join("tall_1.png");
        let gray = dir.path().join("gray_1.png");
        RgbImage::from_pixel(120, 30, Rgb([1, 2, 3])).save(&wide).unwrap();
        RgbImage::from_pixel(40, 90, Rgb([1, 2, 3])).save(&tall).unwrap();
        GrayImage::from_pixel(10, 10, Luma([7])).save(&gray).unwrap();

        let survey = survey_dimensions(&[wide, tall, gray.clone()]).unwrap();
        assert_eq!(survey.images, 3);
        assert_eq!(survey.max_width, 120);
        assert_eq!(survey.max_height, 90);
        assert_eq!(survey.non_rgb, vec![gray]);
    }

    #[test]
    fn test_survey_fails_on_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let bad = dir.path().join("bad_1.png");
        std::fs::write(&bad, b"nope").unwrap();
        assert!(matches!(
            survey_dimensions(&[bad]),
            Err(PackError::ImageDecode { .. })
        ));
    }

    #[test]
    fn test_load_missing_image_carries_path() {
        let err = load_image(Path::new("/definitely/missing.png")).unwrap_err();
        assert!(err.to_string().contains("missing.png"));
    }
}
