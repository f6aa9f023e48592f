use ash::vk;
use tracing::{error, trace, warn};

use xrgs_protocol::layer::{
    CompositionLayerFlags, FrameEndInfo, ProjectionLayer, ProjectionView, Rect2Di,
};
use xrgs_protocol::xr::{
    EnvironmentBlendMode, SpaceId, Time, View, ViewConfigurationType, INFINITE_DURATION,
};

use crate::camera::{CameraConstants, CameraRing};
use crate::error::FrameError;
use crate::gpu::GpuApi;
use crate::registry::ResourceRegistry;
use crate::render::{RenderTarget, ViewRenderer};
use crate::runtime::XrRuntime;
use crate::session::SessionStateMachine;
use crate::submit::CommandSubmitter;
use crate::swapchain::SwapchainManager;

/// What happened during one pass of the frame protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub display_time: Time,
    pub should_render: bool,
    /// A projection layer was handed to the compositor
    pub rendered: bool,
    pub views_rendered: usize,
    pub locate_failed: bool,
}

/// Runs the per-frame compositor protocol: wait, begin, locate, acquire,
/// render, submit, release, end.
///
/// Once begin succeeds, end is always called for the same frame, whatever
/// happens in between.
pub struct FrameDriver {
    view_configuration: ViewConfigurationType,
    blend_mode: EnvironmentBlendMode,
    space: SpaceId,
    near_z: f32,
    far_z: f32,
    cameras: CameraRing,
    frame_index: u64,
}

impl FrameDriver {
    pub fn new(
        view_configuration: ViewConfigurationType,
        blend_mode: EnvironmentBlendMode,
        space: SpaceId,
        near_z: f32,
        far_z: f32,
        view_count: usize,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            view_configuration,
            blend_mode,
            space,
            near_z,
            far_z,
            cameras: CameraRing::new(view_count, frames_in_flight),
            frame_index: 0,
        }
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn view_configuration(&self) -> ViewConfigurationType {
        self.view_configuration
    }

    pub fn blend_mode(&self) -> EnvironmentBlendMode {
        self.blend_mode
    }

    pub fn space(&self) -> SpaceId {
        self.space
    }

    pub fn cameras(&self) -> &CameraRing {
        &self.cameras
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run_frame<R, G, S, V>(
        &mut self,
        runtime: &mut R,
        session: &SessionStateMachine,
        swapchains: &mut SwapchainManager,
        registry: &mut ResourceRegistry<G>,
        submitter: &mut S,
        renderer: &mut V,
    ) -> Result<FrameReport, FrameError>
    where
        R: XrRuntime,
        G: GpuApi,
        S: CommandSubmitter,
        V: ViewRenderer,
    {
        let frame_state = runtime.wait_frame().map_err(FrameError::Wait)?;
        runtime.begin_frame().map_err(FrameError::Begin)?;

        let mut report = FrameReport {
            frame_index: self.frame_index,
            display_time: frame_state.predicted_display_time,
            should_render: frame_state.should_render,
            ..FrameReport::default()
        };

        let mut layers = Vec::new();
        if session.is_render_eligible(frame_state.should_render) {
            match runtime.locate_views(
                self.view_configuration,
                frame_state.predicted_display_time,
                self.space,
                swapchains.len(),
            ) {
                Ok(views) => {
                    if let Some(layer) =
                        self.render_views(runtime, &views, swapchains, registry, submitter, renderer)
                    {
                        report.views_rendered = layer.views.len();
                        layers.push(layer);
                    }
                }
                Err(e) => {
                    error!("locate views failed, skipping frame {}: {}", self.frame_index, e);
                    report.locate_failed = true;
                }
            }
        }
        report.rendered = !layers.is_empty();

        let end_info = FrameEndInfo {
            display_time: frame_state.predicted_display_time,
            blend_mode: self.blend_mode,
            layers,
        };
        let ended = runtime.end_frame(&end_info).map_err(FrameError::End);
        trace!(
            frame = self.frame_index,
            rendered = report.rendered,
            "frame ended at {}",
            frame_state.predicted_display_time.as_nanos()
        );
        self.frame_index += 1;
        ended?;
        Ok(report)
    }

    /// Acquire and wait every view's image, render, submit, then release the
    /// waited ones.
    /// Returns the projection layer only when every located view rendered.
    fn render_views<R, G, S, V>(
        &mut self,
        runtime: &mut R,
        views: &[View],
        swapchains: &mut SwapchainManager,
        registry: &mut ResourceRegistry<G>,
        submitter: &mut S,
        renderer: &mut V,
    ) -> Option<ProjectionLayer>
    where
        R: XrRuntime,
        G: GpuApi,
        S: CommandSubmitter,
        V: ViewRenderer,
    {
        let count = views.len().min(swapchains.len());
        if views.len() > count {
            warn!("runtime located {} views for {} swapchains", views.len(), count);
        }
        if count == 0 {
            return None;
        }

        // Acquire and wait for every view first; the runtime picks the index.
        // Only waited images are listed: releasing one that was never waited
        // is a call-order error.
        let mut waited: Vec<(usize, u32)> = Vec::with_capacity(count);
        let mut ok = true;
        for view in 0..count {
            let Some(swapchain) = swapchains.swapchain(view) else {
                ok = false;
                break;
            };
            let index = match runtime.acquire_swapchain_image(swapchain) {
                Ok(index) => index,
                Err(e) => {
                    error!("acquire swapchain image for view {} failed: {}", view, e);
                    ok = false;
                    break;
                }
            };
            if let Err(e) = runtime.wait_swapchain_image(swapchain, INFINITE_DURATION) {
                error!(
                    "wait swapchain image {} for view {} failed, leaving it unreleased: {}",
                    index, view, e
                );
                ok = false;
                break;
            }
            waited.push((view, index));
            swapchains.set_acquired(view, Some(index));
        }

        let mut projection_views = Vec::with_capacity(count);
        if ok {
            match submitter.begin() {
                Ok(command_buffer) => {
                    for &(view, index) in &waited {
                        match self.render_view(
                            view,
                            index,
                            &views[view],
                            command_buffer,
                            swapchains,
                            registry,
                            renderer,
                        ) {
                            Some(projection) => projection_views.push(projection),
                            None => ok = false,
                        }
                    }
                    if let Err(e) = submitter.submit(command_buffer) {
                        error!("command submission failed: {:?}", e);
                        ok = false;
                    }
                }
                Err(e) => {
                    error!("command buffer begin failed: {:?}", e);
                    ok = false;
                }
            }
        }

        // Release once per waited image, after submission.
        for &(view, _) in &waited {
            if let Some(swapchain) = swapchains.swapchain(view) {
                if let Err(e) = runtime.release_swapchain_image(swapchain) {
                    error!("release swapchain image for view {} failed: {}", view, e);
                }
            }
            swapchains.set_acquired(view, None);
        }

        if !ok || projection_views.len() != count {
            return None;
        }
        Some(ProjectionLayer {
            space: self.space,
            flags: CompositionLayerFlags::BLEND_TEXTURE_SOURCE_ALPHA
                | CompositionLayerFlags::CORRECT_CHROMATIC_ABERRATION,
            views: projection_views,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn render_view<G: GpuApi, V: ViewRenderer>(
        &mut self,
        view: usize,
        index: u32,
        located: &View,
        command_buffer: vk::CommandBuffer,
        swapchains: &SwapchainManager,
        registry: &mut ResourceRegistry<G>,
        renderer: &mut V,
    ) -> Option<ProjectionView> {
        let entry = swapchains.entry(view)?;
        let (Some(image), Some(image_view)) =
            (swapchains.image(view, index), swapchains.image_view(view, index))
        else {
            error!("view {}: runtime returned image index {} out of range", view, index);
            return None;
        };

        let constants =
            CameraConstants::from_view(located, self.near_z, self.far_z, entry.width, entry.height);
        let camera = self.cameras.write(self.frame_index, view, constants)?;

        registry.set_layout(image, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        let target = RenderTarget {
            view_index: view,
            command_buffer,
            image,
            image_view,
            extent: vk::Extent2D {
                width: entry.width,
                height: entry.height,
            },
            camera,
            second_eye_view: (view == 1).then_some(image_view),
        };
        renderer.render_view(&target);
        trace!(frame = self.frame_index, view, image_index = index, "view rendered");

        Some(ProjectionView {
            pose: located.pose,
            fov: located.fov,
            swapchain: entry.swapchain,
            image_rect: Rect2Di {
                x: 0,
                y: 0,
                width: entry.width as i32,
                height: entry.height as i32,
            },
            image_array_index: 0,
        })
    }
}
