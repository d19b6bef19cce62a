use std::convert::TryFrom;
use std::path::PathBuf;

use super::{CaptureError, FrameSource};
use crate::image::RawImage;

/// Frame source reading an image file, reloaded on every capture
///
/// The file acts as a single display, present as long as the file exists.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
}

impl ImageFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FrameSource for ImageFileSource {
    fn display_count(&self) -> Result<usize, CaptureError> {
        Ok(if self.path.is_file() { 1 } else { 0 })
    }

    fn capture(&mut self, display: usize) -> Result<RawImage, CaptureError> {
        if display != 0 {
            return Err(CaptureError::DisplayNotFound {
                index: display,
                count: self.display_count()?,
            });
        }

        let frame = image::open(&self.path)?.to_rgb8();
        Ok(RawImage::try_from(frame)?)
    }
}
