//! Error types for the snowstorm engine.

use thiserror::Error;

/// Errors raised by [`crate::display::PixelBuffer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixelError {
    /// Bit depth other than 8, 24 or 32
    #[error("Unsupported pixel format: {bits_per_pixel} bits per pixel")]
    UnsupportedFormat {
        /// Requested bit depth
        bits_per_pixel: u32,
    },

    /// Checked access outside the buffer
    #[error("Pixel ({x}, {y}) is outside a {width}x{height} buffer")]
    OutOfRange {
        /// Requested column
        x: i32,
        /// Requested row
        y: i32,
        /// Buffer width
        width: u32,
        /// Buffer height
        height: u32,
    },

    /// Paired color arrays of different lengths
    #[error("Color arrays must be of equal length: {from} colors to replace, {to} replacements")]
    MismatchedArrayLengths {
        /// Length of the colors to replace
        from: usize,
        /// Length of the replacement colors
        to: usize,
    },
}

/// Errors raised while persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unwritable JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
