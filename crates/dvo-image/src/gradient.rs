use rayon::prelude::*;

use crate::error::ImageError;
use crate::image::Image;

/// Compute the spatial gradients of a single channel image.
///
/// Uses central differences in the image interior and replicates the border
/// pixels, so the gradient images have the same size as the source.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `gx` - The output gradient along the x axis, same size as `src`.
/// * `gy` - The output gradient along the y axis, same size as `src`.
///
/// # Errors
///
/// Returns an error if the output images do not match the source size.
pub fn spatial_gradient(
    src: &Image<f32, 1>,
    gx: &mut Image<f32, 1>,
    gy: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    for dst in [&*gx, &*gy] {
        if dst.size() != src.size() {
            return Err(ImageError::InvalidImageSize(
                src.width(),
                src.height(),
                dst.width(),
                dst.height(),
            ));
        }
    }

    let cols = src.cols();
    let rows = src.rows();
    let data = src.as_slice();

    gx.as_slice_mut()
        .par_chunks_mut(cols)
        .zip(gy.as_slice_mut().par_chunks_mut(cols))
        .enumerate()
        .for_each(|(y, (gx_row, gy_row))| {
            let y0 = y.saturating_sub(1);
            let y1 = (y + 1).min(rows - 1);
            for x in 0..cols {
                let x0 = x.saturating_sub(1);
                let x1 = (x + 1).min(cols - 1);
                gx_row[x] = 0.5 * (data[y * cols + x1] - data[y * cols + x0]);
                gy_row[x] = 0.5 * (data[y1 * cols + x] - data[y0 * cols + x]);
            }
        });

    Ok(())
}
