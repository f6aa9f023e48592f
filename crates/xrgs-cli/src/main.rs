mod probe;
#[cfg_attr(not(feature = "xr"), allow(dead_code))]
mod renderer;

use clap::{Parser, Subcommand};
use tracing::info;

use xrgs_core::config::{default_config_path, XrgsConfig};

#[derive(Parser)]
#[command(name = "xrgs")]
#[command(about = "XRGS - XR session and frame driver over Vulkan and OpenXR")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an XR session and run the frame loop until the runtime exits
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Request a session exit after this many frames
        #[arg(long)]
        max_frames: Option<u64>,
    },

    /// Bootstrap Vulkan without a runtime and report what was found
    Probe {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    xrgs_common::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, max_frames } => {
            let path = config.unwrap_or_else(default_config_path);
            let mut config = XrgsConfig::load_or_default(&path);
            if max_frames.is_some() {
                config.render.max_frames = max_frames;
            }
            info!("starting XRGS with config {}", path);
            run_xr(&config)?;
        }

        Commands::Probe { config, json } => {
            let path = config.unwrap_or_else(default_config_path);
            probe::run_probe(&path, json)?;
        }

        Commands::Config { config } => {
            let path = config.unwrap_or_else(default_config_path);
            let config = XrgsConfig::load_or_default(&path);
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

#[cfg(feature = "xr")]
fn run_xr(config: &XrgsConfig) -> anyhow::Result<()> {
    use tracing::warn;
    use xrgs_engine::device::{DeviceRequest, VulkanDevice};
    use xrgs_engine::openxr_runtime::{OpenXrInstance, OpenXrRuntime};
    use xrgs_engine::submit::FrameCommands;
    use xrgs_engine::{ResourceRegistry, XrApp};

    let instance = OpenXrInstance::new(config)?;

    let mut warnings = Vec::new();
    let device = VulkanDevice::create(&DeviceRequest::from_config(config), Some(&instance))?
        .collect_into(&mut warnings);
    info!("Vulkan device: {}", device.device_name());

    let submitter = FrameCommands::new(&device)?;
    let runtime = OpenXrRuntime::create_session(instance, &device)?;
    let registry = ResourceRegistry::new(device);

    let mut app = XrApp::initialize(runtime, registry, submitter, config)?;
    for warning in warnings {
        app.push_warning(warning);
    }

    let mut renderer = renderer::LoggingRenderer::default();
    let summary = app.run(&mut renderer, config.render.max_frames)?;
    if !app.warnings().is_empty() {
        warn!("{} startup fallbacks were taken:", app.warnings().len());
        for warning in app.warnings() {
            warn!("  {}", warning);
        }
    }
    app.shutdown();

    println!(
        "{} frames ({} rendered, {} views), {} locate failures, {} frame errors",
        summary.frames,
        summary.rendered,
        renderer.views(),
        summary.locate_failures,
        summary.frame_errors
    );
    Ok(())
}

#[cfg(not(feature = "xr"))]
fn run_xr(_config: &XrgsConfig) -> anyhow::Result<()> {
    anyhow::bail!("xrgs was built without the `xr` feature; rebuild with --features xr to run a session")
}
