//! Configuration system for brook
//!
//! Loads configuration from TOML file at `~/.config/brook/config.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window_manager: WindowManagerConfig,
    /// `"Mod4+Shift+Left" = "move_left"`; unknown actions are commands
    pub keybindings: BTreeMap<String, String>,
    pub startup: StartupConfig,
}

impl Default for Config {
    fn default() -> Self {
        let keybindings = [
            ("Mod4+b", "firefox"),
            ("Mod4+t", "alacritty"),
            ("Mod4+Left", "move_left"),
            ("Mod4+Right", "move_right"),
            ("Mod4+Up", "move_up"),
            ("Mod4+Down", "move_down"),
            ("Mod4+f", "fullscreen"),
            ("Mod4+m", "maximize"),
            ("Mod4+q", "close"),
            ("Mod4+r", "resize_mode"),
            ("Mod4+l", "lock"),
        ];

        Self {
            window_manager: WindowManagerConfig::default(),
            keybindings: keybindings.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            startup: StartupConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing file yields the defaults, and a default file is written so
    /// the user has something to edit next time.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            let config = Self::default();
            if let Err(e) = config.save(&config_path) {
                warn!("Failed to create default config file: {}", e);
            } else {
                info!("Created default config file at {:?}", config_path);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {:?}", config_path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", config_path))?;

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("brook");

        Ok(config_dir.join("config.toml"))
    }

    /// Serialize this configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;
        Ok(())
    }
}

/// Window manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowManagerConfig {
    pub decorations: WindowDecorationConfig,
    pub colors: WindowColors,
    pub behavior: WindowBehaviorConfig,
}

/// Window decoration geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowDecorationConfig {
    /// Titlebar height in pixels
    pub titlebar_height: u16,
    /// Frame border width in pixels
    pub border_width: u16,
    /// Maximize/close box size in pixels
    pub button_size: u16,
    /// Gap between the close box and the frame's right edge
    pub button_margin: u16,
    /// Gap between the maximize and close boxes
    pub button_spacing: u16,
    /// Width of the grab zone along each frame edge
    pub resize_border: u32,
}

impl Default for WindowDecorationConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 24,
            border_width: 1,
            button_size: 16,
            button_margin: 4,
            button_spacing: 4,
            resize_border: 6,
        }
    }
}

/// Window colors configuration (hex: 0xRRGGBB)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowColors {
    pub titlebar: u32,
    pub border: u32,
    pub maximize_button: u32,
    pub close_button: u32,
    /// Maximize square and close cross
    pub glyph: u32,
    pub title_text: u32,
}

impl Default for WindowColors {
    fn default() -> Self {
        Self {
            titlebar: 0x000000,
            border: 0xffffff,
            maximize_button: 0x888888,
            close_button: 0xff0000,
            glyph: 0xffffff,
            title_text: 0xffffff,
        }
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowBehaviorConfig {
    /// Lay out managed windows automatically
    pub tiling: bool,
    /// Size for degenerate windows and for restoring from maximize/fullscreen
    pub default_width: u32,
    pub default_height: u32,
    /// Interactive resize floor
    pub min_width: u32,
    pub min_height: u32,
    /// Dropping a dragged window this close to the monitor top maximizes it
    pub snap_threshold: u32,
    /// Pixels per keyboard move/resize step
    pub keyboard_step: u32,
}

impl Default for WindowBehaviorConfig {
    fn default() -> Self {
        Self {
            tiling: false,
            default_width: 800,
            default_height: 600,
            min_width: 100,
            min_height: 100,
            snap_threshold: 5,
            keyboard_step: 30,
        }
    }
}

/// Things to run when brook starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Launched in order before windows are managed
    pub commands: Vec<String>,
    /// Arguments for an `xrandr` run before anything else
    pub xrandr: Option<String>,
    /// Screen locker, run synchronously by the `lock` action
    pub lock_command: Option<String>,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            xrandr: None,
            lock_command: Some("slock".to_string()),
        }
    }
}
