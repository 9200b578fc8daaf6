//! Window lifecycle
//!
//! Appear, disappear, withdraw and geometry-change requests for top-level
//! windows. Every handler tolerates windows that vanished between the
//! notification and the handling of it.

use anyhow::Result;
use tracing::{debug, info};

use crate::shared::Geometry;
use crate::wm::backend::{ClientInput, ConfigureRequest, DisplayServer, WindowId};
use crate::wm::ewmh::WmState;
use crate::wm::{screen, WindowManager};

/// Degenerate windows are smaller than this in either dimension
const DEGENERATE: u32 = 100;

impl<D: DisplayServer> WindowManager<D> {
    pub(crate) fn on_map_request(&mut self, window: WindowId) -> Result<()> {
        let Some(attrs) = self.display.window_attributes(window)? else {
            debug!("Window {} vanished before it could be managed", window);
            return Ok(());
        };

        if attrs.override_redirect {
            self.display.map(window)?;
            if self.display.is_normal_type(window)? {
                debug!("Override-redirect window {} declares itself normal", window);
                self.display.raise(window)?;
                self.display.set_focus(window)?;
                self.display.grab_focus_click(window)?;
            }
            return Ok(());
        }

        // Re-map of a withdrawn window
        if let Some(entry) = self.registry.find(window) {
            let (frame, client) = (entry.frame, entry.client);
            self.display.map(frame)?;
            self.display.map(client)?;
            return Ok(());
        }
        if self.managed.contains(&window) {
            self.display.map(window)?;
            return Ok(());
        }

        let fullscreen = self.display.window_state(window)?.contains(WmState::FULLSCREEN);
        let decorate = !fullscreen && self.display.wants_decorations(window)? != Some(false);

        let Some(current) = self.display.geometry(window)? else {
            return Ok(());
        };
        let hints = self.display.size_hints(window)?.unwrap_or_default();
        let behavior = &self.config.window_manager.behavior;
        let (width, height) = hints
            .preferred_size()
            .or_else(|| hints.min_size())
            .unwrap_or(if current.width < DEGENERATE || current.height < DEGENERATE {
                (behavior.default_width, behavior.default_height)
            } else {
                (current.width, current.height)
            });

        let monitor = screen::primary_monitor(&mut self.display);
        let rect = if fullscreen {
            monitor
        } else if hints.has_position() {
            Geometry::new(current.x, current.y, width, height)
        } else {
            monitor.centered(width, height)
        };

        let top = if decorate {
            self.create_frame(window, rect, attrs.viewable)?
        } else {
            self.display.move_resize(window, rect)?;
            self.display.map(window)?;
            self.display.select_client_input(window, ClientInput::Minimal)?;
            self.display.grab_focus_click(window)?;
            if fullscreen {
                self.display.set_window_state(window, WmState::FULLSCREEN)?;
            }
            window
        };

        info!("Managing window {} (decorated={}) at {:?}", window, decorate, rect);
        self.managed.push(top);
        self.publish_client_list()?;
        self.focus(window)?;
        self.retile()
    }

    /// Destroy notification for any window. Absent windows are a no-op.
    pub(crate) fn on_destroy(&mut self, window: WindowId) -> Result<()> {
        self.pending_unmaps.remove(&window);
        if self.forget(window)? {
            self.retile()?;
        }
        Ok(())
    }

    /// A framed client withdrawing itself takes its frame with it
    pub(crate) fn on_unmap(&mut self, event: WindowId, window: WindowId) -> Result<()> {
        if event != window {
            return Ok(());
        }
        if self.pending_unmaps.remove(&window) {
            return Ok(());
        }
        if let Some(frame) = self.registry.by_client(window).map(|f| f.frame) {
            debug!("Client {} withdrawn, unmapping frame {}", window, frame);
            self.display.unmap(frame)?;
        }
        Ok(())
    }

    pub(crate) fn on_configure_request(&mut self, request: &ConfigureRequest) -> Result<()> {
        let framed = self.registry.by_client(request.window).map(|f| f.frame);
        let top = framed.unwrap_or(request.window);

        if self.tiling && self.managed.contains(&top) {
            // Layout owns the geometry
            return self.retile();
        }

        let Some(frame) = framed else {
            self.display.configure(request)?;
            return Ok(());
        };
        let Some(current) = self.display.geometry(frame)? else {
            return Ok(());
        };
        let band = self.band();
        let rect = Geometry::new(
            request.x.unwrap_or(current.x),
            request.y.unwrap_or(current.y),
            request.width.unwrap_or(current.width),
            request.height.map_or(current.height, |h| h + band),
        );
        debug!("Client {} asked for {:?}, frame becomes {:?}", request.window, request, rect);
        self.place(frame, rect)?;
        self.paint_frame(frame)
    }

    /// Manage windows that were already mapped before we started
    pub fn adopt_existing(&mut self) -> Result<()> {
        for window in self.display.top_level_windows()? {
            if self.registry.find(window).is_some() {
                continue;
            }
            match self.display.window_attributes(window)? {
                Some(attrs) if attrs.viewable && !attrs.override_redirect => {
                    debug!("Adopting existing window {}", window);
                    self.on_map_request(window)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
