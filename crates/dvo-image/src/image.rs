use num_traits::Zero;

use crate::error::ImageError;

/// Image size in pixels
///
/// A struct to represent the size of an image in pixels.
///
/// # Examples
///
/// ```
/// use dvo_image::ImageSize;
///
/// let image_size = ImageSize {
///   width: 10,
///   height: 20,
/// };
///
/// assert_eq!(image_size.width, 10);
/// assert_eq!(image_size.height, 20);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSize {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "ImageSize {{ width: {}, height: {} }}",
            self.width, self.height
        )
    }
}

impl From<[usize; 2]> for ImageSize {
    fn from(size: [usize; 2]) -> Self {
        ImageSize {
            width: size[0],
            height: size[1],
        }
    }
}

/// Represents an image with pixel data.
///
/// The image is stored row-major with shape (H, W, C), where H is the height,
/// W the width and C the number of channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T, const C: usize> {
    size: ImageSize,
    data: Vec<T>,
}

impl<T, const C: usize> Image<T, C>
where
    T: Copy,
{
    /// Create a new image from pixel data.
    ///
    /// # Arguments
    ///
    /// * `size` - The size of the image in pixels.
    /// * `data` - The pixel data of the image, length `width * height * C`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data length does not match the image size.
    pub fn new(size: ImageSize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = size.width * size.height * C;
        if data.len() != expected {
            return Err(ImageError::InvalidChannelShape(data.len(), expected));
        }
        Ok(Self { size, data })
    }

    /// Create a new image filled with a constant value.
    pub fn from_size_val(size: ImageSize, val: T) -> Self {
        Self {
            size,
            data: vec![val; size.width * size.height * C],
        }
    }

    /// The size of the image in pixels.
    #[inline]
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// The width of the image in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.size.width
    }

    /// The height of the image in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.size.height
    }

    /// The number of rows, same as the height.
    #[inline]
    pub fn rows(&self) -> usize {
        self.size.height
    }

    /// The number of columns, same as the width.
    #[inline]
    pub fn cols(&self) -> usize {
        self.size.width
    }

    /// Get the pixel data as a flat slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Get the pixel data as a flat mutable slice.
    #[inline]
    pub fn as_slice_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Get the value of a pixel channel, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize, ch: usize) -> Option<T> {
        if x >= self.size.width || y >= self.size.height || ch >= C {
            return None;
        }
        Some(self.data[(y * self.size.width + x) * C + ch])
    }

    /// Get the value of a pixel channel without bounds checking the
    /// coordinates against the image size.
    ///
    /// The caller must guarantee `x < width`, `y < height` and `ch < C`.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize, ch: usize) -> T {
        self.data[(y * self.size.width + x) * C + ch]
    }
}

impl<T, const C: usize> Image<T, C>
where
    T: Copy + Zero,
{
    /// Create a new image filled with zeros.
    pub fn zeros(size: ImageSize) -> Self {
        Self::from_size_val(size, T::zero())
    }
}
