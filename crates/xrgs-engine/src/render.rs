use ash::vk;

use crate::camera::CameraConstants;

/// Everything the renderer gets for one view of one frame. None of it may be
/// kept past the call.
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget<'a> {
    pub view_index: usize,
    pub command_buffer: vk::CommandBuffer,
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub extent: vk::Extent2D,
    pub camera: &'a CameraConstants,
    /// Set for the second eye of a stereo pair
    pub second_eye_view: Option<vk::ImageView>,
}

/// The external renderer. Failures are the renderer's own business; the
/// frame goes on either way.
pub trait ViewRenderer {
    fn render_view(&mut self, target: &RenderTarget<'_>);
}

impl<F: FnMut(&RenderTarget<'_>)> ViewRenderer for F {
    fn render_view(&mut self, target: &RenderTarget<'_>) {
        self(target)
    }
}
