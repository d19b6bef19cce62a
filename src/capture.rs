use thiserror::Error;

use crate::{
    image::{RawImage, RawImageError},
    models::{self, CaptureSource},
};

mod file;
pub use file::ImageFileSource;

#[cfg(feature = "screen")]
mod screen;
#[cfg(feature = "screen")]
pub use screen::ScreenSource;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("frame source not supported: {0}")]
    NotSupported(&'static str),
    #[error("no display available")]
    NoDisplay,
    #[error("display {index} not found ({count} available)")]
    DisplayNotFound { index: usize, count: usize },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid frame: {0}")]
    Frame(#[from] RawImageError),
    #[cfg(feature = "screen")]
    #[error("screen capture error: {0}")]
    Screen(#[from] xcap::XCapError),
}

/// Provider of full-size frames for a display
pub trait FrameSource: Send {
    /// Number of displays that can currently be captured
    fn display_count(&self) -> Result<usize, CaptureError>;

    /// Capture the whole area of the display at index `display`
    fn capture(&mut self, display: usize) -> Result<RawImage, CaptureError>;
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn display_count(&self) -> Result<usize, CaptureError> {
        (**self).display_count()
    }

    fn capture(&mut self, display: usize) -> Result<RawImage, CaptureError> {
        (**self).capture(display)
    }
}

pub fn from_config(config: &models::Capture) -> Result<Box<dyn FrameSource>, CaptureError> {
    let source: Box<dyn FrameSource> = match &config.source {
        CaptureSource::File(path) => Box::new(ImageFileSource::new(path.clone())),
        #[cfg(feature = "screen")]
        CaptureSource::Screen => Box::new(ScreenSource::new()),
        #[cfg(not(feature = "screen"))]
        CaptureSource::Screen => {
            return Err(CaptureError::NotSupported(
                "screen capture requires the `screen` feature",
            ));
        }
    };

    Ok(source)
}
