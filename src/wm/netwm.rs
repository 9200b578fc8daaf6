//! NETWM state handling
//!
//! Fullscreen and maximize are not stored anywhere: whether a window is
//! "currently" fullscreen or maximized is recomputed from its geometry
//! against the monitor it sits on, and `_NET_WM_STATE` is republished after
//! every transition as a hint for clients.

use anyhow::Result;
use tracing::{debug, info};

use crate::shared::Geometry;
use crate::wm::backend::{DisplayServer, WindowId};
use crate::wm::ewmh::{StateAction, WmState};
use crate::wm::{screen, WindowManager};

/// Fullscreen means covering the monitor exactly
pub fn fullscreen_active(window: &Geometry, monitor: &Geometry) -> bool {
    window == monitor
}

/// Combined maximize test: both dimensions match the monitor, position is
/// not considered.
pub fn maximized_active(window: &Geometry, monitor: &Geometry) -> bool {
    window.width == monitor.width && window.height == monitor.height
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Fullscreen,
    Maximize,
}

impl<D: DisplayServer> WindowManager<D> {
    /// Apply a `_NET_WM_STATE` change to a client (or to the client of a
    /// frame). Requests for untracked windows are ignored.
    pub(crate) fn handle_state_request(
        &mut self,
        window: WindowId,
        action: StateAction,
        states: WmState,
    ) -> Result<()> {
        // One message may carry both; maximize takes precedence
        let target = if states.intersects(WmState::MAXIMIZED) {
            Target::Maximize
        } else if states.contains(WmState::FULLSCREEN) {
            Target::Fullscreen
        } else {
            debug!("Ignoring _NET_WM_STATE request without handled states for {}", window);
            return Ok(());
        };

        let Some((top, client)) = self.top_level(window) else {
            debug!("_NET_WM_STATE for untracked window {}", window);
            return Ok(());
        };
        let Some(geom) = self.display.geometry(top)? else {
            return Ok(());
        };
        let monitor = screen::monitor_for_window(&mut self.display, &geom);

        let active = match target {
            Target::Fullscreen => fullscreen_active(&geom, &monitor),
            Target::Maximize => maximized_active(&geom, &monitor),
        };

        if action.enables(active) {
            match target {
                Target::Fullscreen => {
                    info!("Fullscreen window {}", client);
                    self.place_fullscreen(top, monitor)?;
                    self.display.set_window_state(client, WmState::FULLSCREEN)?;
                }
                Target::Maximize => {
                    info!("Maximize window {}", client);
                    self.place(top, monitor)?;
                    self.display.set_window_state(client, WmState::MAXIMIZED)?;
                }
            }
        } else {
            let behavior = &self.config.window_manager.behavior;
            let restored = monitor.centered(behavior.default_width, behavior.default_height);
            info!("Restore window {} to {:?}", client, restored);
            self.place(top, restored)?;
            self.display.set_window_state(client, WmState::empty())?;
        }

        if let Some(frame) = self.registry.by_frame(top).map(|f| f.frame) {
            self.paint_frame(frame)?;
        }
        Ok(())
    }
}
