//! brook - a reparenting X11 window manager
//!
//! Frames top-level windows with a title band carrying maximize and close
//! boxes, follows EWMH state requests, and can tile windows across the
//! primary monitor.

mod config;
mod launch;
mod shared;
mod wm;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use launch::ProcessLauncher;
use wm::backend::BackendError;
use wm::x11::X11Backend;
use wm::WindowManager;

#[derive(Debug, Parser)]
#[command(name = "brook", version, about = "Reparenting X11 window manager")]
struct Args {
    /// Configuration file (default: ~/.config/brook/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with automatic tiling enabled
    #[arg(long)]
    tiling: bool,

    /// X display to manage (default: $DISPLAY)
    #[arg(long)]
    display: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "brook=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting brook window manager");

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if args.tiling {
        info!("--tiling flag detected: tiling enabled");
        config.window_manager.behavior.tiling = true;
    }

    launch::ignore_child_exits()?;

    let mut backend = match X11Backend::connect(args.display.as_deref()) {
        Ok(backend) => backend,
        Err(BackendError::AlreadyManaged(display_name)) => {
            error!("Another window manager is already running on {}", display_name);
            eprintln!("brook: another window manager is already running on {}", display_name);
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to connect to X server"),
    };

    let launcher = ProcessLauncher::new(
        Some(backend.display_name().to_string()),
        config.startup.lock_command.clone(),
    );
    if let Some(xrandr) = &config.startup.xrandr {
        launcher.run_xrandr(xrandr);
    }
    let origin = wm::screen::primary_monitor(&mut backend);
    for command in &config.startup.commands {
        launcher.spawn_detached(command, origin.x, origin.y);
    }

    // Setup signal handlers for graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let flag = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            flag.store(true, Ordering::SeqCst);
        });
    }

    // The dispatcher blocks on the X connection, so it gets its own thread
    let flag = shutdown.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<()> {
        let mut wm = WindowManager::new(backend, config, Box::new(launcher))?;
        wm.start()?;
        wm.run(&flag)
    })
    .await
    .context("Event loop task panicked")?;

    if let Err(e) = &result {
        error!("Window manager error: {:#}", e);
    }
    info!("brook exited");
    result
}
