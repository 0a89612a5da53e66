//! Speed Editor Driver CLI
//!
//! Waits for the control surface, authenticates it, and translates its
//! vendor reports into synthetic input until terminated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hidapi::HidApi;
use tracing::info;

use speededitor_driver::keymap::KeyMap;
use speededitor_driver::protocol::{PRODUCT_ID, VENDOR_ID};
use speededitor_driver::session::DeviceSession;
use speededitor_driver::sink;
use speededitor_transport::HidChannel;

mod cli;
use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::List) => list_devices(),
        None => run(&cli),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let keymap = match &cli.keymap {
        Some(path) => KeyMap::with_overrides(path)
            .with_context(|| format!("loading keymap overrides from {}", path.display()))?,
        None => KeyMap::builtin(),
    };
    info!("Keymap: {} bindings", keymap.len());

    // The sink is opened before waiting for the device so a missing
    // backend fails fast instead of after a plug-in
    let sink = sink::open(cli.backend).context("opening input backend")?;

    let channel = HidChannel::open(VENDOR_ID, PRODUCT_ID).context("opening device")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("installing signal handler")?;
    }

    let mut session = DeviceSession::new(Box::new(channel), sink, keymap, shutdown);
    session.run()?;
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    let hidapi = HidApi::new()?;
    println!("All HID devices:");
    for device_info in hidapi.device_list() {
        let marker = if device_info.vendor_id() == VENDOR_ID {
            " <-- Speed Editor"
        } else {
            ""
        };
        println!(
            "  VID={:04x} PID={:04x} usage={:04x} page={:04x} if={} product={}{}",
            device_info.vendor_id(),
            device_info.product_id(),
            device_info.usage(),
            device_info.usage_page(),
            device_info.interface_number(),
            device_info.product_string().unwrap_or("?"),
            marker,
        );
    }
    Ok(())
}
