use std::convert::TryFrom;

use xcap::Monitor;

use super::{CaptureError, FrameSource};
use crate::image::RawImage;

/// Frame source capturing monitors, the primary one first
#[derive(Debug, Default)]
pub struct ScreenSource;

impl ScreenSource {
    pub fn new() -> Self {
        Self
    }

    fn monitors() -> Result<Vec<Monitor>, CaptureError> {
        let mut monitors = Monitor::all()?;
        monitors.sort_by_key(|monitor| !monitor.is_primary().unwrap_or(false));
        Ok(monitors)
    }
}

impl FrameSource for ScreenSource {
    fn display_count(&self) -> Result<usize, CaptureError> {
        Ok(Self::monitors()?.len())
    }

    fn capture(&mut self, display: usize) -> Result<RawImage, CaptureError> {
        let monitors = Self::monitors()?;
        let count = monitors.len();

        let monitor = monitors
            .into_iter()
            .nth(display)
            .ok_or(CaptureError::DisplayNotFound {
                index: display,
                count,
            })?;

        let frame = monitor.capture_image()?;
        let (width, height) = (frame.width(), frame.height());

        // RGBA to RGB
        let data = frame
            .into_raw()
            .chunks_exact(4)
            .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
            .collect();

        Ok(RawImage::try_from((data, width, height))?)
    }
}
