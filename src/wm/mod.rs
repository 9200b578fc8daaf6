//! Window Manager Module
//!
//! The `WindowManager` context owns every piece of mutable window
//! management state and is driven by the event dispatcher in `events`.
//! Handlers for each concern live next to their logic:
//!
//! - `lifecycle`: appear, disappear, withdraw, geometry requests
//! - `decorations`: frame creation and painting
//! - `moveresize`: drag and resize interaction
//! - `netwm`: `_NET_WM_STATE` transitions
//! - `tiling`: automatic layout
//! - `keyboard`: key bindings

pub mod backend;
pub mod decorations;
pub mod events;
pub mod ewmh;
pub mod keyboard;
pub mod lifecycle;
pub mod moveresize;
pub mod netwm;
pub mod registry;
pub mod screen;
pub mod tiling;
pub mod x11;

#[cfg(test)]
pub mod testing;

use anyhow::Result;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::Config;
use crate::launch::Launcher;
use crate::shared::Geometry;
use backend::{CursorShape, DisplayServer, WindowId};
use keyboard::KeyBindings;
use moveresize::InteractionState;
use registry::Registry;

pub struct WindowManager<D: DisplayServer> {
    pub(crate) display: D,
    pub(crate) config: Config,
    pub(crate) launcher: Box<dyn Launcher>,
    pub(crate) registry: Registry,
    /// Managed top-level windows (frames, or clients without one) in
    /// arrival order. This is both `_NET_CLIENT_LIST` and the tiling order.
    pub(crate) managed: Vec<WindowId>,
    pub(crate) interaction: InteractionState,
    /// Focused client
    pub(crate) focused: Option<WindowId>,
    pub(crate) bindings: KeyBindings,
    pub(crate) tiling: bool,
    pub(crate) resize_mode: bool,
    /// Clients whose next unmap is caused by our own reparenting
    pub(crate) pending_unmaps: HashSet<WindowId>,
}

impl<D: DisplayServer> WindowManager<D> {
    pub fn new(mut display: D, config: Config, launcher: Box<dyn Launcher>) -> Result<Self> {
        let bindings = KeyBindings::grab(&mut display, &config.keybindings)?;
        let tiling = config.window_manager.behavior.tiling;
        info!("Window manager ready (tiling={})", tiling);

        Ok(Self {
            display,
            config,
            launcher,
            registry: Registry::new(),
            managed: Vec::new(),
            interaction: InteractionState::Idle,
            focused: None,
            bindings,
            tiling,
            resize_mode: false,
            pending_unmaps: HashSet::new(),
        })
    }

    /// Publish initial root properties and adopt already-mapped windows
    pub fn start(&mut self) -> Result<()> {
        let root = self.display.root();
        self.display.set_cursor(root, CursorShape::Default)?;
        self.publish_client_list()?;
        self.display.publish_active_window(None)?;
        self.adopt_existing()?;
        self.display.flush()?;
        Ok(())
    }

    pub(crate) fn band(&self) -> u32 {
        self.config.window_manager.decorations.titlebar_height as u32
    }

    pub(crate) fn min_size(&self) -> (u32, u32) {
        let behavior = &self.config.window_manager.behavior;
        (behavior.min_width, behavior.min_height)
    }

    /// (top-level window, client) for a frame, a framed client, or a
    /// managed undecorated client
    pub(crate) fn top_level(&self, window: WindowId) -> Option<(WindowId, WindowId)> {
        if let Some(entry) = self.registry.find(window) {
            return Some((entry.frame, entry.client));
        }
        self.managed.contains(&window).then_some((window, window))
    }

    /// Move/resize a top-level window. A frame takes `rect` and its client
    /// fills the area below the title band.
    pub(crate) fn place(&mut self, window: WindowId, rect: Geometry) -> Result<()> {
        match self.registry.by_frame(window).map(|f| f.client) {
            Some(client) => {
                let band = self.band();
                self.display.move_resize(window, rect)?;
                self.display.move_resize(
                    client,
                    Geometry::new(0, band as i32, rect.width, rect.height.saturating_sub(band)),
                )?;
            }
            None => self.display.move_resize(window, rect)?,
        }
        Ok(())
    }

    /// Like `place`, but a framed client also covers the title band
    pub(crate) fn place_fullscreen(&mut self, window: WindowId, rect: Geometry) -> Result<()> {
        self.display.move_resize(window, rect)?;
        if let Some(client) = self.registry.by_frame(window).map(|f| f.client) {
            self.display.move_resize(client, Geometry::new(0, 0, rect.width, rect.height))?;
        }
        Ok(())
    }

    /// Raise, focus and announce a client
    pub(crate) fn focus(&mut self, client: WindowId) -> Result<()> {
        let top = self.top_level(client).map_or(client, |(top, _)| top);
        self.display.raise(top)?;
        self.display.set_focus(client)?;
        self.display.publish_active_window(Some(client))?;
        self.focused = Some(client);
        Ok(())
    }

    pub(crate) fn publish_client_list(&mut self) -> Result<()> {
        self.display.publish_client_list(&self.managed)?;
        Ok(())
    }

    /// Drop every trace of `window` (frame or client). Returns false when
    /// nothing referenced it.
    pub(crate) fn forget(&mut self, window: WindowId) -> Result<bool> {
        let mut changed = false;
        let mut top = window;
        let mut client = window;

        if let Some(entry) = self.registry.remove(window) {
            changed = true;
            top = entry.frame;
            client = entry.client;
            if window == entry.client {
                self.display.destroy(entry.frame)?;
            } else {
                self.display.destroy(entry.client)?;
            }
            if let Some(gc) = entry.gc {
                self.display.free_gc(gc)?;
            }
            debug!("Removed frame {} of client {}", entry.frame, entry.client);
        }

        let before = self.managed.len();
        self.managed.retain(|&w| w != top);
        changed |= self.managed.len() != before;

        if changed {
            if self.interaction.window() == Some(top) {
                debug!("Window {} vanished mid-interaction", top);
                self.end_interaction()?;
            }
            if self.focused == Some(client) {
                self.focused = None;
                self.display.publish_active_window(None)?;
            }
            self.publish_client_list()?;
        }
        Ok(changed)
    }
}
