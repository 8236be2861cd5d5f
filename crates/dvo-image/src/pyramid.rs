use crate::error::ImageError;
use crate::image::{Image, ImageSize};

fn check_half_size(src: &Image<f32, 1>, dst: &Image<f32, 1>) -> Result<(), ImageError> {
    if src.width() < 2 || src.height() < 2 {
        return Err(ImageError::ImageTooSmall(src.width(), src.height(), 2, 2));
    }
    let expected_width = src.width() / 2;
    let expected_height = src.height() / 2;
    if dst.width() != expected_width || dst.height() != expected_height {
        return Err(ImageError::InvalidImageSize(
            expected_width,
            expected_height,
            dst.width(),
            dst.height(),
        ));
    }
    Ok(())
}

/// Downsample an intensity image to half resolution.
///
/// Each destination pixel is the mean of the corresponding 2x2 source block.
///
/// # Arguments
///
/// * `src` - The source image.
/// * `dst` - The destination image, half the source size (rounded down).
///
/// # Errors
///
/// Returns an error if the destination size is not half the source size.
pub fn pyrdown_intensity(src: &Image<f32, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    check_half_size(src, dst)?;

    let src_cols = src.cols();
    let dst_cols = dst.cols();
    let data = src.as_slice();
    let out = dst.as_slice_mut();

    for y in 0..out.len() / dst_cols {
        for x in 0..dst_cols {
            let base = 2 * y * src_cols + 2 * x;
            out[y * dst_cols + x] =
                0.25 * (data[base] + data[base + 1] + data[base + src_cols] + data[base + src_cols + 1]);
        }
    }

    Ok(())
}

/// Downsample a depth image to half resolution.
///
/// Each destination pixel is the mean of the valid (strictly positive) samples
/// of the corresponding 2x2 source block, or zero when the whole block is
/// invalid. Averaging across invalid samples would bleed missing depth into
/// measured regions.
///
/// # Arguments
///
/// * `src` - The source depth image.
/// * `dst` - The destination image, half the source size (rounded down).
///
/// # Errors
///
/// Returns an error if the destination size is not half the source size.
pub fn pyrdown_depth(src: &Image<f32, 1>, dst: &mut Image<f32, 1>) -> Result<(), ImageError> {
    check_half_size(src, dst)?;

    let src_cols = src.cols();
    let dst_cols = dst.cols();
    let data = src.as_slice();
    let out = dst.as_slice_mut();

    for y in 0..out.len() / dst_cols {
        for x in 0..dst_cols {
            let base = 2 * y * src_cols + 2 * x;
            let block = [
                data[base],
                data[base + 1],
                data[base + src_cols],
                data[base + src_cols + 1],
            ];
            let mut sum = 0.0;
            let mut count = 0;
            for d in block {
                if d > 0.0 {
                    sum += d;
                    count += 1;
                }
            }
            out[y * dst_cols + x] = if count > 0 { sum / count as f32 } else { 0.0 };
        }
    }

    Ok(())
}

/// Build an intensity pyramid with `levels` octaves, level 0 being the input.
pub fn build_intensity_pyramid(
    base: &Image<f32, 1>,
    levels: usize,
) -> Result<Vec<Image<f32, 1>>, ImageError> {
    build_pyramid(base, levels, pyrdown_intensity)
}

/// Build a depth pyramid with `levels` octaves, level 0 being the input.
pub fn build_depth_pyramid(
    base: &Image<f32, 1>,
    levels: usize,
) -> Result<Vec<Image<f32, 1>>, ImageError> {
    build_pyramid(base, levels, pyrdown_depth)
}

fn build_pyramid(
    base: &Image<f32, 1>,
    levels: usize,
    reduce: fn(&Image<f32, 1>, &mut Image<f32, 1>) -> Result<(), ImageError>,
) -> Result<Vec<Image<f32, 1>>, ImageError> {
    let mut pyramid = Vec::with_capacity(levels);
    pyramid.push(base.clone());
    for level in 1..levels {
        let prev = &pyramid[level - 1];
        let mut next = Image::zeros(ImageSize {
            width: prev.width() / 2,
            height: prev.height() / 2,
        });
        reduce(prev, &mut next)?;
        pyramid.push(next);
    }
    Ok(pyramid)
}
