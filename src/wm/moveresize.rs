//! MoveResize Module
//!
//! Pointer-driven interactive moving and resizing.
//!
//! Exactly one interaction can be active at a time. A press on a frame's
//! title band (or anywhere on an eligible undecorated window) starts a drag,
//! a press inside the resize band along any edge starts a resize, and any
//! button release returns to idle. Destroying the window being dragged also
//! returns to idle (see `lifecycle`).

use anyhow::Result;
use bitflags::bitflags;
use tracing::{debug, info};

use crate::shared::Geometry;
use crate::wm::backend::{CursorShape, DisplayServer, PointerEvent, WindowId};
use crate::wm::ewmh::{MoveResizeDirection, StateAction, WmState};
use crate::wm::{netwm, screen, WindowManager};

bitflags! {
    /// Edges a resize acts on. Opposite edges never combine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResizeEdges: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const TOP    = 1 << 2;
        const BOTTOM = 1 << 3;
    }
}

impl ResizeEdges {
    pub const TOP_LEFT: ResizeEdges = ResizeEdges::TOP.union(ResizeEdges::LEFT);
    pub const TOP_RIGHT: ResizeEdges = ResizeEdges::TOP.union(ResizeEdges::RIGHT);
    pub const BOTTOM_LEFT: ResizeEdges = ResizeEdges::BOTTOM.union(ResizeEdges::LEFT);
    pub const BOTTOM_RIGHT: ResizeEdges = ResizeEdges::BOTTOM.union(ResizeEdges::RIGHT);

    /// Classify a window-relative position against a `band`-wide border.
    ///
    /// Left wins over right and top over bottom when a window is narrower
    /// than two bands.
    pub fn at(x: i32, y: i32, width: u32, height: u32, band: u32) -> ResizeEdges {
        let band = band as i32;
        let mut edges = ResizeEdges::empty();

        if x <= band {
            edges |= ResizeEdges::LEFT;
        } else if x >= width as i32 - band {
            edges |= ResizeEdges::RIGHT;
        }

        if y <= band {
            edges |= ResizeEdges::TOP;
        } else if y >= height as i32 - band {
            edges |= ResizeEdges::BOTTOM;
        }

        edges
    }

    pub fn is_valid(self) -> bool {
        !self.contains(ResizeEdges::LEFT | ResizeEdges::RIGHT)
            && !self.contains(ResizeEdges::TOP | ResizeEdges::BOTTOM)
    }

    /// Edges for a `_NET_WM_MOVERESIZE` size direction
    pub fn from_direction(direction: MoveResizeDirection) -> Option<ResizeEdges> {
        use MoveResizeDirection::*;
        Some(match direction {
            SizeTopLeft => ResizeEdges::TOP_LEFT,
            SizeTop => ResizeEdges::TOP,
            SizeTopRight => ResizeEdges::TOP_RIGHT,
            SizeRight => ResizeEdges::RIGHT,
            SizeBottomRight => ResizeEdges::BOTTOM_RIGHT,
            SizeBottom => ResizeEdges::BOTTOM,
            SizeBottomLeft => ResizeEdges::BOTTOM_LEFT,
            SizeLeft => ResizeEdges::LEFT,
            Move | SizeKeyboard | MoveKeyboard | Cancel => return None,
        })
    }

    pub fn cursor(self) -> CursorShape {
        match self {
            e if e == ResizeEdges::TOP_LEFT => CursorShape::TopLeft,
            e if e == ResizeEdges::TOP_RIGHT => CursorShape::TopRight,
            e if e == ResizeEdges::BOTTOM_LEFT => CursorShape::BottomLeft,
            e if e == ResizeEdges::BOTTOM_RIGHT => CursorShape::BottomRight,
            e if e == ResizeEdges::LEFT => CursorShape::Left,
            e if e == ResizeEdges::RIGHT => CursorShape::Right,
            e if e == ResizeEdges::TOP => CursorShape::Top,
            e if e == ResizeEdges::BOTTOM => CursorShape::Bottom,
            _ => CursorShape::Default,
        }
    }
}

/// Pointer interaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Dragging {
        window: WindowId,
        /// Pointer position minus window origin at grab time
        offset: (i32, i32),
    },
    Resizing {
        window: WindowId,
        edges: ResizeEdges,
        anchor: Geometry,
        pointer: (i32, i32),
    },
}

impl InteractionState {
    pub fn window(&self) -> Option<WindowId> {
        match *self {
            Self::Idle => None,
            Self::Dragging { window, .. } | Self::Resizing { window, .. } => Some(window),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Project the pointer delta onto `edges` of `anchor`.
///
/// Width and height never drop below the minimum; when the minimum clamps a
/// left or top resize, the origin is pinned so the opposite edge stays put.
pub fn resize_geometry(
    anchor: Geometry,
    edges: ResizeEdges,
    dx: i32,
    dy: i32,
    min_width: u32,
    min_height: u32,
) -> Geometry {
    let mut rect = anchor;
    let (aw, ah) = (anchor.width as i64, anchor.height as i64);
    let (min_w, min_h) = (min_width as i64, min_height as i64);

    if edges.contains(ResizeEdges::LEFT) {
        let width = (aw - dx as i64).max(min_w);
        rect.width = width as u32;
        rect.x = (anchor.x as i64 + aw - width) as i32;
    } else if edges.contains(ResizeEdges::RIGHT) {
        rect.width = (aw + dx as i64).max(min_w) as u32;
    }

    if edges.contains(ResizeEdges::TOP) {
        let height = (ah - dy as i64).max(min_h);
        rect.height = height as u32;
        rect.y = (anchor.y as i64 + ah - height) as i32;
    } else if edges.contains(ResizeEdges::BOTTOM) {
        rect.height = (ah + dy as i64).max(min_h) as u32;
    }

    rect
}

impl<D: DisplayServer> WindowManager<D> {
    /// Enter `Dragging` for a top-level window
    pub(crate) fn begin_drag(&mut self, window: WindowId, root_x: i32, root_y: i32) -> Result<()> {
        if !self.interaction.is_idle() {
            return Ok(());
        }
        let Some(mut geom) = self.display.geometry(window)? else {
            return Ok(());
        };

        let monitor = screen::monitor_for_window(&mut self.display, &geom);
        if netwm::maximized_active(&geom, &monitor) {
            let client = self.registry.by_frame(window).map_or(window, |f| f.client);
            debug!("Unmaximizing window {} before drag", client);
            self.handle_state_request(client, StateAction::Remove, WmState::MAXIMIZED)?;

            // Put the restored window under the pointer, grabbed by its title band
            let Some(restored) = self.display.geometry(window)? else {
                return Ok(());
            };
            let grab_y = if self.registry.is_frame(window) {
                self.band() as i32 / 2
            } else {
                restored.height as i32 / 2
            };
            geom = restored.with_position(root_x - restored.width as i32 / 2, root_y - grab_y);
            self.display.move_to(window, geom.x, geom.y)?;
        }

        if !self.display.grab_pointer(window, CursorShape::Move)? {
            debug!("Pointer grab refused, not dragging window {}", window);
            return Ok(());
        }

        self.interaction = InteractionState::Dragging {
            window,
            offset: (root_x - geom.x, root_y - geom.y),
        };
        debug!("Dragging window {}", window);
        Ok(())
    }

    /// Enter `Resizing` for a top-level window
    pub(crate) fn begin_resize(
        &mut self,
        window: WindowId,
        edges: ResizeEdges,
        root_x: i32,
        root_y: i32,
    ) -> Result<()> {
        if !self.interaction.is_idle() || edges.is_empty() || !edges.is_valid() {
            return Ok(());
        }
        let Some(anchor) = self.display.geometry(window)? else {
            return Ok(());
        };
        if !self.display.grab_pointer(window, edges.cursor())? {
            debug!("Pointer grab refused, not resizing window {}", window);
            return Ok(());
        }

        self.interaction = InteractionState::Resizing {
            window,
            edges,
            anchor,
            pointer: (root_x, root_y),
        };
        debug!("Resizing window {} ({:?})", window, edges);
        Ok(())
    }

    pub(crate) fn on_motion(&mut self, ev: &PointerEvent) -> Result<()> {
        match self.interaction {
            InteractionState::Dragging { window, offset } => {
                self.display.move_to(window, ev.root_x - offset.0, ev.root_y - offset.1)?;
            }
            InteractionState::Resizing { window, edges, anchor, pointer } => {
                let (min_w, min_h) = self.min_size();
                let rect = resize_geometry(
                    anchor,
                    edges,
                    ev.root_x - pointer.0,
                    ev.root_y - pointer.1,
                    min_w,
                    min_h,
                );
                self.place(window, rect)?;
            }
            InteractionState::Idle => self.update_hover_cursor(ev)?,
        }
        Ok(())
    }

    fn update_hover_cursor(&mut self, ev: &PointerEvent) -> Result<()> {
        if !self.registry.is_frame(ev.window) {
            return Ok(());
        }
        let Some(geom) = self.display.geometry(ev.window)? else {
            return Ok(());
        };
        let band = self.config.window_manager.decorations.resize_border;
        let edges = ResizeEdges::at(ev.x, ev.y, geom.width, geom.height, band);
        self.display.set_cursor(ev.window, edges.cursor())?;
        Ok(())
    }

    pub(crate) fn on_button_release(&mut self, _ev: &PointerEvent) -> Result<()> {
        let state = self.interaction;
        self.end_interaction()?;

        if let InteractionState::Dragging { window, .. } = state {
            let Some(geom) = self.display.geometry(window)? else {
                return Ok(());
            };
            let monitor = screen::best_overlap_monitor(&mut self.display, &geom);
            let snap = self.config.window_manager.behavior.snap_threshold as i32;
            if geom.y <= monitor.y + snap {
                info!("Window {} dropped at top edge, maximizing", window);
                let client = self.registry.by_frame(window).map_or(window, |f| f.client);
                self.handle_state_request(client, StateAction::Add, WmState::MAXIMIZED)?;
            }
        }
        Ok(())
    }

    /// Return to `Idle`, releasing the pointer if anything held it
    pub(crate) fn end_interaction(&mut self) -> Result<()> {
        if self.interaction.is_idle() {
            return Ok(());
        }
        self.interaction = InteractionState::Idle;
        self.display.ungrab_pointer()?;
        Ok(())
    }

    /// Entry point for `_NET_WM_MOVERESIZE`: start the interaction without
    /// hit-testing.
    pub(crate) fn handle_moveresize_request(
        &mut self,
        window: WindowId,
        root_x: i32,
        root_y: i32,
        direction: MoveResizeDirection,
    ) -> Result<()> {
        let Some((top, _)) = self.top_level(window) else {
            debug!("_NET_WM_MOVERESIZE for unmanaged window {}", window);
            return Ok(());
        };

        match direction {
            MoveResizeDirection::Cancel => self.end_interaction(),
            MoveResizeDirection::Move => self.begin_drag(top, root_x, root_y),
            MoveResizeDirection::SizeKeyboard | MoveResizeDirection::MoveKeyboard => {
                debug!("Keyboard move/resize not supported (window {})", window);
                Ok(())
            }
            size => match ResizeEdges::from_direction(size) {
                Some(edges) => self.begin_resize(top, edges, root_x, root_y),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::backend::Output;
    use crate::wm::testing::{harness, FakeEvent};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_edges_at_corners_and_sides() {
        assert_eq!(ResizeEdges::at(2, 2, 800, 600, 6), ResizeEdges::TOP_LEFT);
        assert_eq!(ResizeEdges::at(797, 598, 800, 600, 6), ResizeEdges::BOTTOM_RIGHT);
        assert_eq!(ResizeEdges::at(400, 597, 800, 600, 6), ResizeEdges::BOTTOM);
        assert_eq!(ResizeEdges::at(400, 300, 800, 600, 6), ResizeEdges::empty());
    }

    #[test]
    fn test_edges_never_combine_opposites() {
        // Narrower than two bands
        let edges = ResizeEdges::at(3, 3, 8, 8, 6);
        assert!(edges.is_valid());
        assert_eq!(edges, ResizeEdges::TOP_LEFT);
        assert!(!(ResizeEdges::LEFT | ResizeEdges::RIGHT).is_valid());
    }

    #[test]
    fn test_cursor_for_edges() {
        assert_eq!(ResizeEdges::TOP_RIGHT.cursor(), CursorShape::TopRight);
        assert_eq!(ResizeEdges::LEFT.cursor(), CursorShape::Left);
        assert_eq!(ResizeEdges::empty().cursor(), CursorShape::Default);
    }

    #[test]
    fn test_resize_right_bottom() {
        let anchor = Geometry::new(100, 100, 400, 300);
        let rect = resize_geometry(anchor, ResizeEdges::BOTTOM_RIGHT, 50, -20, 100, 100);
        assert_eq!(rect, Geometry::new(100, 100, 450, 280));
    }

    #[test]
    fn test_resize_left_keeps_right_edge_when_clamped() {
        let anchor = Geometry::new(100, 100, 400, 300);
        let rect = resize_geometry(anchor, ResizeEdges::LEFT, 350, 0, 100, 100);
        assert_eq!(rect, Geometry::new(400, 100, 100, 300));
        assert_eq!(rect.right(), anchor.right());
    }

    #[test]
    fn test_resize_never_below_minimum() {
        let anchor = Geometry::new(0, 0, 300, 300);
        for edges in [
            ResizeEdges::LEFT,
            ResizeEdges::RIGHT,
            ResizeEdges::TOP,
            ResizeEdges::BOTTOM,
            ResizeEdges::TOP_LEFT,
            ResizeEdges::BOTTOM_RIGHT,
        ] {
            for delta in [-5000, -301, -1, 0, 1, 299, 5000] {
                let rect = resize_geometry(anchor, edges, delta, delta, 100, 100);
                assert!(rect.width >= 100 && rect.height >= 100, "{edges:?} {delta}: {rect:?}");
            }
        }
    }

    #[test]
    fn test_drag_only_moves() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        let before = h.wm.display.rect(frame);

        // Press in the title band, left of the affordances
        h.wm.dispatch(FakeEvent::press(frame, before.x + 200, before.y + 12, 200, 12)).unwrap();
        assert!(matches!(h.wm.interaction, InteractionState::Dragging { .. }));
        assert_eq!(h.wm.display.grabbed, Some(frame));

        for (dx, dy) in [(15, 40), (-300, 7), (1, -1)] {
            h.wm.dispatch(FakeEvent::motion(frame, before.x + 200 + dx, before.y + 12 + dy)).unwrap();
            let after = h.wm.display.rect(frame);
            assert_eq!((after.x - before.x, after.y - before.y), (dx, dy));
            assert_eq!((after.width, after.height), (before.width, before.height));
        }

        h.wm.dispatch(FakeEvent::release(frame, 0, 0)).unwrap();
        assert_eq!(h.wm.interaction, InteractionState::Idle);
        assert_eq!(h.wm.display.grabbed, None);
    }

    #[test]
    fn test_resize_from_bottom_right_resizes_client() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        let start = h.wm.display.rect(frame);

        h.wm.dispatch(FakeEvent::press(frame, start.right() - 2, start.bottom() - 2, 798, 598)).unwrap();
        assert!(matches!(h.wm.interaction, InteractionState::Resizing { .. }));

        h.wm.dispatch(FakeEvent::motion(frame, start.right() + 98, start.bottom() - 802)).unwrap();
        assert_eq!(h.wm.display.rect(frame), Geometry::new(start.x, start.y, 900, 100));
        assert_eq!(h.wm.display.rect(client), Geometry::new(0, 24, 900, 76));
    }

    #[test]
    fn test_drop_at_top_edge_maximizes() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);

        h.wm.dispatch(FakeEvent::press(frame, 760, 252, 200, 12)).unwrap();
        h.wm.dispatch(FakeEvent::motion(frame, 760, 14)).unwrap();
        assert_eq!(h.wm.display.rect(frame).y, 2);
        h.wm.dispatch(FakeEvent::release(frame, 760, 14)).unwrap();

        assert_eq!(h.wm.display.rect(frame), Geometry::new(0, 0, 1920, 1080));
        assert_eq!(h.wm.display.window(client).state, WmState::MAXIMIZED);
    }

    #[test]
    fn test_refused_grab_stays_idle() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        let before = h.wm.display.rect(frame);
        h.wm.display.refuse_grab = true;

        // Title band, then bottom-right corner
        h.wm.dispatch(FakeEvent::press(frame, 760, 252, 200, 12)).unwrap();
        assert_eq!(h.wm.interaction, InteractionState::Idle);
        h.wm.dispatch(FakeEvent::press(frame, 1358, 838, 798, 598)).unwrap();
        assert_eq!(h.wm.interaction, InteractionState::Idle);
        assert_eq!(h.wm.display.grabbed, None);

        h.wm.dispatch(FakeEvent::motion(frame, 900, 900)).unwrap();
        assert_eq!(h.wm.display.rect(frame), before);
    }

    #[test]
    fn test_output_unplugged_mid_drag_snaps_to_desktop() {
        let mut h = harness(1920, 1080);
        h.wm.display.outputs = vec![Output {
            name: "DP-1".into(),
            rect: Geometry::new(0, 0, 1280, 1024),
            primary: true,
            active: true,
        }];
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        assert_eq!(h.wm.display.rect(frame), Geometry::new(240, 212, 800, 600));

        h.wm.dispatch(FakeEvent::press(frame, 440, 224, 200, 12)).unwrap();
        h.wm.dispatch(FakeEvent::motion(frame, 440, 14)).unwrap();
        h.wm.display.outputs.clear();
        h.wm.dispatch(FakeEvent::release(frame, 440, 14)).unwrap();

        assert_eq!(h.wm.interaction, InteractionState::Idle);
        assert_eq!(h.wm.display.rect(frame), Geometry::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_dragging_maximized_window_restores_under_pointer() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        h.wm.dispatch(FakeEvent::state(client, StateAction::Add, WmState::MAXIMIZED)).unwrap();

        h.wm.dispatch(FakeEvent::press(frame, 1000, 10, 1000, 10)).unwrap();
        let restored = h.wm.display.rect(frame);
        assert_eq!((restored.width, restored.height), (800, 600));
        assert_eq!((restored.x, restored.y), (600, -2));
        assert_eq!(h.wm.display.window(client).state, WmState::empty());

        h.wm.dispatch(FakeEvent::motion(frame, 1100, 300)).unwrap();
        assert_eq!(h.wm.display.rect(frame), Geometry::new(700, 288, 800, 600));
    }

    #[test]
    fn test_moveresize_request_skips_hit_test() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);

        h.wm.dispatch(FakeEvent::moveresize(client, 900, 500, MoveResizeDirection::SizeLeft)).unwrap();
        match h.wm.interaction {
            InteractionState::Resizing { window, edges, pointer, .. } => {
                assert_eq!(window, frame);
                assert_eq!(edges, ResizeEdges::LEFT);
                assert_eq!(pointer, (900, 500));
            }
            other => panic!("expected resize, got {other:?}"),
        }

        h.wm.dispatch(FakeEvent::moveresize(client, 0, 0, MoveResizeDirection::Cancel)).unwrap();
        assert!(h.wm.interaction.is_idle());
        assert_eq!(h.wm.display.grabbed, None);
    }

    #[test]
    fn test_hover_sets_directional_cursor() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);

        h.wm.dispatch(FakeEvent::hover(frame, 3, 300)).unwrap();
        assert_eq!(h.wm.display.window(frame).cursor, Some(CursorShape::Left));
        h.wm.dispatch(FakeEvent::hover(frame, 400, 300)).unwrap();
        assert_eq!(h.wm.display.window(frame).cursor, Some(CursorShape::Default));
    }
}
