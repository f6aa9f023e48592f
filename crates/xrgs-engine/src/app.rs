use std::time::Duration;

use tracing::{error, info, warn};

use xrgs_core::config::{RenderConfig, XrgsConfig};
use xrgs_protocol::xr::{EnvironmentBlendMode, SpaceId, ViewConfigurationType};

use crate::error::{EngineError, FrameError, SessionError, SwapchainError};
use crate::frame::{FrameDriver, FrameReport};
use crate::gpu::GpuApi;
use crate::registry::ResourceRegistry;
use crate::render::ViewRenderer;
use crate::runtime::XrRuntime;
use crate::selection::{select_blend_mode, select_reference_space, select_view_configuration};
use crate::session::SessionStateMachine;
use crate::submit::CommandSubmitter;
use crate::swapchain::SwapchainManager;
use crate::warning::FallbackWarning;

/// One undo step recorded during initialization. Steps are undone in
/// reverse order of creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownStep {
    ReferenceSpace(SpaceId),
    Swapchains,
}

/// Totals for one call to [`XrApp::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames that went through wait/begin/end
    pub frames: u64,
    /// Frames that submitted a projection layer
    pub rendered: u64,
    pub locate_failures: u64,
    /// Frames abandoned on a wait, begin or end failure
    pub frame_errors: u64,
}

/// Owns every piece of the XR pipeline and tears it down in order.
///
/// Fields drop top to bottom: the runtime goes first, then the submitter,
/// and the registry (which owns the device) goes last. [`XrApp::shutdown`]
/// must have run before that, and `Drop` makes sure it has.
pub struct XrApp<R: XrRuntime, G: GpuApi, S: CommandSubmitter> {
    runtime: R,
    submitter: S,
    swapchains: SwapchainManager,
    registry: ResourceRegistry<G>,
    session: SessionStateMachine,
    driver: FrameDriver,
    teardown: Vec<TeardownStep>,
    warnings: Vec<FallbackWarning>,
    render: RenderConfig,
    shut_down: bool,
}

impl<R: XrRuntime, G: GpuApi, S: CommandSubmitter> XrApp<R, G, S> {
    /// Pick the view configuration, blend mode and reference space, create
    /// the space, then one swapchain per view.
    ///
    /// On failure everything created so far is torn down before returning.
    pub fn initialize(
        runtime: R,
        registry: ResourceRegistry<G>,
        submitter: S,
        config: &XrgsConfig,
    ) -> Result<Self, EngineError> {
        // Locals drop before parameters: on an early return the session
        // goes before the device.
        let mut runtime = runtime;
        let mut warnings = Vec::new();
        let xr = &config.xr;

        let view_configuration = select_view_configuration(
            &xr.view_configurations,
            &runtime.enumerate_view_configurations()?,
        )
        .collect_into(&mut warnings);
        let blend_mode = select_blend_mode(
            &xr.blend_modes,
            &runtime.enumerate_blend_modes(view_configuration)?,
        )
        .collect_into(&mut warnings);
        let space_type =
            select_reference_space(&xr.reference_spaces, &runtime.enumerate_reference_spaces()?)
                .collect_into(&mut warnings);

        let views = runtime.view_configuration_views(view_configuration)?;
        if views.is_empty() {
            return Err(SwapchainError::NoViews.into());
        }
        for (i, view) in views.iter().enumerate() {
            info!(
                "view {}: recommended {}x{} (max {}x{}), {} samples",
                i,
                view.recommended_image_rect_width,
                view.recommended_image_rect_height,
                view.max_image_rect_width,
                view.max_image_rect_height,
                view.recommended_swapchain_sample_count
            );
        }

        let space = runtime.create_reference_space(space_type, xr.origin_pose())?;
        info!("created {:?} reference space {:?}", space_type, space);

        let session = SessionStateMachine::new(runtime.session(), view_configuration);
        let driver = FrameDriver::new(
            view_configuration,
            blend_mode,
            space,
            config.render.near_z,
            config.render.far_z,
            views.len(),
            config.render.frames_in_flight,
        );

        let mut app = Self {
            runtime,
            submitter,
            swapchains: SwapchainManager::new(),
            registry,
            session,
            driver,
            teardown: vec![TeardownStep::ReferenceSpace(space), TeardownStep::Swapchains],
            warnings,
            render: config.render.clone(),
            shut_down: false,
        };

        // Dropping `app` on error runs the teardown stack.
        let format = app.swapchains.create(
            &mut app.runtime,
            &mut app.registry,
            &views,
            xr.format_order,
        )?;
        format.collect_into(&mut app.warnings);

        info!(
            "XR pipeline ready: {:?}, {:?}, {} swapchains",
            view_configuration,
            blend_mode,
            app.swapchains.len()
        );
        Ok(app)
    }

    /// Drive the event and frame loop until the runtime ends the
    /// application. With `max_frames`, a session exit is requested once that
    /// many frames have been attempted and the loop continues until the runtime says
    /// the session is exiting.
    pub fn run<V: ViewRenderer>(
        &mut self,
        renderer: &mut V,
        max_frames: Option<u64>,
    ) -> Result<RunSummary, EngineError> {
        let idle = Duration::from_millis(self.render.idle_poll_ms);
        let mut summary = RunSummary::default();
        let mut exit_requested = false;

        loop {
            match self.session.poll_events(&mut self.runtime) {
                Ok(_) => {}
                Err(e @ SessionError::BeginFailed(_)) => return Err(e.into()),
                Err(e) => {
                    error!("{}", e);
                    std::thread::sleep(idle);
                    continue;
                }
            }

            if !self.session.is_application_running() {
                break;
            }
            if !self.session.is_session_running() {
                std::thread::sleep(idle);
                continue;
            }

            if let Some(max) = max_frames {
                if summary.frames + summary.frame_errors >= max && !exit_requested {
                    info!("reached {} frames, requesting session exit", max);
                    self.session.request_exit(&mut self.runtime);
                    exit_requested = true;
                    continue;
                }
            }

            match self.run_frame(renderer) {
                Ok(report) => {
                    summary.frames += 1;
                    if report.rendered {
                        summary.rendered += 1;
                    }
                    if report.locate_failed {
                        summary.locate_failures += 1;
                    }
                }
                Err(e) => {
                    error!("frame failed: {}", e);
                    summary.frame_errors += 1;
                    std::thread::sleep(idle);
                }
            }
        }

        info!(
            "run finished: {} frames, {} rendered, {} frame errors",
            summary.frames, summary.rendered, summary.frame_errors
        );
        Ok(summary)
    }

    /// One pass of the frame protocol.
    pub fn run_frame<V: ViewRenderer>(&mut self, renderer: &mut V) -> Result<FrameReport, FrameError> {
        self.driver.run_frame(
            &mut self.runtime,
            &self.session,
            &mut self.swapchains,
            &mut self.registry,
            &mut self.submitter,
            renderer,
        )
    }

    /// Undo initialization in reverse order, then destroy whatever the
    /// registry still tracks. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.registry.wait_idle();

        while let Some(step) = self.teardown.pop() {
            match step {
                TeardownStep::Swapchains => {
                    self.swapchains.destroy(&mut self.runtime, &mut self.registry);
                }
                TeardownStep::ReferenceSpace(space) => {
                    if let Err(e) = self.runtime.destroy_space(space) {
                        error!("destroy reference space {:?} failed: {}", space, e);
                    }
                }
            }
        }

        let leftover = self.registry.live_count();
        if leftover > 0 {
            warn!("{} registry resources still live at shutdown", leftover);
        }
        self.registry.destroy_all();
        info!("XR pipeline shut down");
    }

    // ── Accessors ───────────────────────────────────────────

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn registry(&self) -> &ResourceRegistry<G> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry<G> {
        &mut self.registry
    }

    pub fn swapchains(&self) -> &SwapchainManager {
        &self.swapchains
    }

    pub fn session(&self) -> &SessionStateMachine {
        &self.session
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn view_configuration(&self) -> ViewConfigurationType {
        self.driver.view_configuration()
    }

    pub fn blend_mode(&self) -> EnvironmentBlendMode {
        self.driver.blend_mode()
    }

    pub fn space(&self) -> SpaceId {
        self.driver.space()
    }

    pub fn frame_index(&self) -> u64 {
        self.driver.frame_index()
    }

    /// Every fallback taken during initialization.
    pub fn warnings(&self) -> &[FallbackWarning] {
        &self.warnings
    }

    pub fn push_warning(&mut self, warning: FallbackWarning) {
        self.warnings.push(warning);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}

impl<R: XrRuntime, G: GpuApi, S: CommandSubmitter> Drop for XrApp<R, G, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
