use tracing::{debug, trace};

use xrgs_engine::render::{RenderTarget, ViewRenderer};

/// Stand-in renderer for `xrgs run`: records nothing into the command
/// buffer and logs what it was handed.
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    views: u64,
}

impl LoggingRenderer {
    pub fn views(&self) -> u64 {
        self.views
    }
}

impl ViewRenderer for LoggingRenderer {
    fn render_view(&mut self, target: &RenderTarget<'_>) {
        if self.views == 0 {
            debug!(
                "first view: {}x{}, image {:?}",
                target.extent.width, target.extent.height, target.image
            );
        }
        self.views += 1;
        let eye = target.camera.position;
        trace!(
            view = target.view_index,
            stereo_pair = target.second_eye_view.is_some(),
            "render view at ({:.3}, {:.3}, {:.3})",
            eye[0],
            eye[1],
            eye[2]
        );
    }
}
