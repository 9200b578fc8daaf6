//! Launching commands and the screen locker
//!
//! Children are detached into their own session so they outlive brook and
//! never receive signals aimed at it. `SIGCHLD` is ignored process-wide (see
//! `ignore_child_exits`), so nothing ever needs to reap them.

use std::fs::{File, OpenOptions};
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use tracing::{debug, info, warn};

/// Collaborator that starts external programs for key bindings
pub trait Launcher {
    /// Start `command` detached; `(x, y)` is the suggested placement.
    fn launch(&mut self, command: &str, x: i32, y: i32);

    /// Run the screen locker and block until it exits
    fn lock(&mut self);
}

/// Stop exited children from lingering as zombies
pub fn ignore_child_exits() -> Result<()> {
    // SAFETY: SIG_IGN installs no handler code.
    unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigIgn) }.context("Failed to ignore SIGCHLD")?;
    Ok(())
}

/// Runs commands through `sh -c` on the managed display
pub struct ProcessLauncher {
    display: Option<String>,
    lock_command: Option<String>,
    log_path: Option<PathBuf>,
}

impl ProcessLauncher {
    pub fn new(display: Option<String>, lock_command: Option<String>) -> Self {
        let log_path = dirs::cache_dir().map(|dir| dir.join("brook").join("launch.log"));
        Self { display, lock_command, log_path }
    }

    /// Output sink for children, falling back to nowhere
    fn log_file(&self) -> Stdio {
        let opened = self.log_path.as_ref().and_then(|path| {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok()?;
            }
            OpenOptions::new().create(true).append(true).open(path).ok()
        });
        match opened.or_else(|| File::options().write(true).open("/dev/null").ok()) {
            Some(file) => Stdio::from(file),
            None => Stdio::null(),
        }
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(display) = &self.display {
            cmd.env("DISPLAY", display);
        }
        if let Ok(xauth) = std::env::var("XAUTHORITY") {
            cmd.env("XAUTHORITY", xauth);
        }
        cmd
    }

    /// Start `command` without waiting. Failures are logged.
    pub fn spawn_detached(&self, command: &str, x: i32, y: i32) {
        let mut cmd = self.command(command);
        cmd.env("BROOK_LAUNCH_X", x.to_string())
            .env("BROOK_LAUNCH_Y", y.to_string())
            .stdin(Stdio::null())
            .stdout(self.log_file())
            .stderr(self.log_file());

        // SAFETY: only async-signal-safe calls between fork and exec.
        unsafe {
            cmd.pre_exec(|| {
                signal::signal(Signal::SIGCHLD, SigHandler::SigDfl)?;
                nix::unistd::setsid()?;
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => info!("Launched {:?} (pid {})", command, child.id()),
            Err(e) => warn!("Failed to launch {:?}: {}", command, e),
        }
    }

    /// Run `xrandr <args>` to completion before any window is managed
    pub fn run_xrandr(&self, args: &str) {
        info!("Running xrandr {}", args);
        self.run_blocking(&format!("xrandr {}", args));
    }

    fn run_blocking(&self, command: &str) {
        match self.command(command).status() {
            Ok(status) if !status.success() => warn!("{:?} exited with {}", command, status),
            Ok(_) => debug!("{:?} finished", command),
            // Children are auto-reaped while SIGCHLD is ignored, so the wait
            // can lose the race for the exit status
            Err(e) if e.raw_os_error() == Some(Errno::ECHILD as i32) => debug!("{:?} finished", command),
            Err(e) => warn!("Failed to run {:?}: {}", command, e),
        }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&mut self, command: &str, x: i32, y: i32) {
        self.spawn_detached(command, x, y);
    }

    fn lock(&mut self) {
        match self.lock_command.clone() {
            Some(command) => self.run_blocking(&command),
            None => warn!("No lock_command configured"),
        }
    }
}
