//! Host-side lifecycle driver.
//!
//! Stands in for the injector: builds the start parameters, brings the
//! runtime up against a module image, and runs the unload protocol
//! (ctrl-c requests unload, a worker thread performs teardown, the main
//! thread waits for the finish signal).

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use clap::Parser;
use keel::{LogLevelControl, ProcessContext, Signal, StartInfo, StartOptions, Supervisor};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, reload};

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Injected-runtime lifecycle driver")]
struct Args {
    /// Host module image to scan
    #[arg(long)]
    image: PathBuf,

    /// Base address the image is mapped at (hex)
    #[arg(long, default_value = "140000000", value_parser = parse_hex)]
    base: u64,

    #[arg(long, default_value = "assets")]
    assets: PathBuf,

    #[arg(long, default_value = "plugins")]
    plugins: PathBuf,

    #[arg(long, default_value = "plugins-default")]
    default_plugins: PathBuf,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, default_value = "en")]
    language: String,

    #[arg(long, default_value = "unknown")]
    host_version: String,

    /// Suppress overlay construction
    #[arg(long)]
    no_overlay: bool,

    /// Suppress extension loading
    #[arg(long)]
    no_plugins: bool,

    /// Opt out of telemetry
    #[arg(long)]
    no_telemetry: bool,
}

fn parse_hex(value: &str) -> Result<u64, String> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, reload_handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let log_control = LogLevelControl::new(move |level| {
        reload_handle
            .modify(|filter| *filter = EnvFilter::new(level.to_string()))
            .is_ok()
    });

    let args = Args::parse();
    info!("keel {} starting", env!("CARGO_PKG_VERSION"));

    let context = ProcessContext::from_file(&args.image, args.base)?;
    let start_info = StartInfo {
        working_dir: std::env::current_dir()?,
        asset_dir: args.assets,
        plugin_dir: args.plugins,
        default_plugin_dir: args.default_plugins,
        config_path: args.config,
        language: args.language,
        host_version: args.host_version,
        no_telemetry: args.no_telemetry,
    };

    let finished = Arc::new(Signal::new());
    let mut supervisor = Supervisor::new(start_info, log_control, Arc::clone(&finished))
        .with_module_image(context);

    supervisor.start(StartOptions {
        load_overlay: !args.no_overlay,
        load_plugins: !args.no_plugins,
    });

    if !supervisor.is_ready() {
        supervisor.dispose();
        anyhow::bail!("runtime failed to start, see log for the failing step");
    }

    let unload = supervisor.unload_signal();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, unloading...");
        unload.set();
    })?;

    // Teardown happens on its own thread, decoupled from whoever
    // requested the unload.
    let finished_worker = Arc::clone(&finished);
    let worker = thread::spawn(move || {
        supervisor.wait_for_unload();
        supervisor.dispose();
        finished_worker.set();
    });

    println!("Runtime up. Press Ctrl+C to unload.");
    finished.wait();
    let _ = worker.join();
    info!("Unload finished");

    Ok(())
}
