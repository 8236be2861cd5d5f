/// An error type for image containers and pixel operations.
#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    /// Error when the data length does not match the image size.
    #[error("Data length ({0}) does not match the image size ({1})")]
    InvalidChannelShape(usize, usize),

    /// Error when an image does not have the expected size.
    #[error("Image size ({0}x{1}) does not match the expected size ({2}x{3})")]
    InvalidImageSize(usize, usize, usize, usize),

    /// Error when an image is too small for the requested operation.
    #[error("Image size ({0}x{1}) is too small, minimum is ({2}x{3})")]
    ImageTooSmall(usize, usize, usize, usize),
}
