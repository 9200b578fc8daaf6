//! Events Module
//!
//! The dispatcher: one blocking fetch per iteration, one handler per event.
//! A failing handler is logged and the loop carries on.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::wm::backend::{DisplayEvent, DisplayServer, PointerEvent, BUTTON_PRIMARY};
use crate::wm::decorations::{TitleBarHit, TitleBarLayout};
use crate::wm::ewmh::{StateAction, WmState};
use crate::wm::moveresize::ResizeEdges;
use crate::wm::WindowManager;

impl<D: DisplayServer> WindowManager<D> {
    /// Run until `shutdown` is observed at the top of an iteration.
    ///
    /// Only losing the display connection ends the loop early.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        info!("Entering event loop");
        while !shutdown.load(Ordering::SeqCst) {
            let event = self.display.next_event()?;
            let kind = event.kind();
            if let Err(e) = self.dispatch(event) {
                warn!("Error handling {} event: {:#}", kind, e);
            }
            if let Err(e) = self.display.flush() {
                warn!("Failed to flush requests: {}", e);
            }
        }
        info!("Shutdown requested, leaving event loop");
        Ok(())
    }

    pub fn dispatch(&mut self, event: DisplayEvent) -> Result<()> {
        match event {
            DisplayEvent::MapRequest { window } => self.on_map_request(window),
            DisplayEvent::ConfigureRequest(request) => self.on_configure_request(&request),
            DisplayEvent::DestroyNotify { window } => self.on_destroy(window),
            DisplayEvent::UnmapNotify { event, window } => self.on_unmap(event, window),
            DisplayEvent::KeyPress { keycode, state } => self.on_key_press(keycode, state),
            DisplayEvent::KeyRelease { keycode, .. } => self.on_key_release(keycode),
            DisplayEvent::ButtonPress(ev) => self.on_button_press(&ev),
            DisplayEvent::ButtonRelease(ev) => self.on_button_release(&ev),
            DisplayEvent::Motion(ev) => self.on_motion(&ev),
            DisplayEvent::Expose { window, count } => self.on_expose(window, count),
            DisplayEvent::TitleChanged { window } => self.on_title_changed(window),
            DisplayEvent::StateRequest { window, action, states } => {
                self.handle_state_request(window, action, states)
            }
            DisplayEvent::MoveResizeRequest { window, root_x, root_y, direction } => {
                self.handle_moveresize_request(window, root_x, root_y, direction)
            }
            DisplayEvent::Other => Ok(()),
        }
    }

    /// Click-to-focus, then route primary presses to the affordances or
    /// the interaction state machine
    fn on_button_press(&mut self, ev: &PointerEvent) -> Result<()> {
        if let Some(entry) = self.registry.find(ev.window) {
            let (frame, client) = (entry.frame, entry.client);
            self.focus(client)?;
            self.display.replay_pointer(ev.time)?;

            if ev.window != frame || ev.button != BUTTON_PRIMARY {
                return Ok(());
            }
            let Some(geom) = self.display.geometry(frame)? else {
                return Ok(());
            };

            let border = self.config.window_manager.decorations.resize_border;
            let edges = ResizeEdges::at(ev.x, ev.y, geom.width, geom.height, border);
            if !edges.is_empty() {
                return self.begin_resize(frame, edges, ev.root_x, ev.root_y);
            }

            let layout = TitleBarLayout::new(geom.width, &self.config.window_manager.decorations);
            return match layout.hit(ev.x, ev.y) {
                TitleBarHit::Maximize => self.handle_state_request(client, StateAction::Toggle, WmState::MAXIMIZED),
                TitleBarHit::Close => {
                    info!("Close requested for window {}", client);
                    self.display.send_delete(client)?;
                    Ok(())
                }
                TitleBarHit::Band => self.begin_drag(frame, ev.root_x, ev.root_y),
                TitleBarHit::Outside => Ok(()),
            };
        }

        // Undecorated windows carry the same click grab as framed clients
        self.display.replay_pointer(ev.time)?;
        let eligible = self.managed.contains(&ev.window)
            || self
                .display
                .window_attributes(ev.window)?
                .is_some_and(|attrs| attrs.override_redirect);
        if !eligible {
            return Ok(());
        }

        self.display.raise(ev.window)?;
        self.display.set_focus(ev.window)?;
        if ev.button != BUTTON_PRIMARY {
            return Ok(());
        }
        let Some(geom) = self.display.geometry(ev.window)? else {
            return Ok(());
        };
        let border = self.config.window_manager.decorations.resize_border;
        let edges = ResizeEdges::at(ev.x, ev.y, geom.width, geom.height, border);
        if edges.is_empty() {
            debug!("Dragging undecorated window {}", ev.window);
            self.begin_drag(ev.window, ev.root_x, ev.root_y)
        } else {
            self.begin_resize(ev.window, edges, ev.root_x, ev.root_y)
        }
    }
}
