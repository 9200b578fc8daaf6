//! Window decorations (title band, maximize and close boxes)
//!
//! Layout and painting are pure functions of the frame width, the cached
//! title and the configured colors, so repainting from any trigger
//! (exposure, title change, resize) produces the same picture.

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::{WindowColors, WindowDecorationConfig};
use crate::shared::Geometry;
use crate::wm::backend::{ClientInput, DisplayServer, DrawOp, WindowId};
use crate::wm::registry::Frame;
use crate::wm::WindowManager;

/// Approximate advance of the core "fixed" font
const GLYPH_WIDTH: i32 = 6;
const TITLE_LEFT: i32 = 10;

/// Where a frame-relative point lands on the title band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleBarHit {
    Close,
    Maximize,
    Band,
    Outside,
}

/// Title band geometry for one frame width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TitleBarLayout {
    pub band: Geometry,
    pub maximize: Geometry,
    pub close: Geometry,
}

impl TitleBarLayout {
    pub fn new(frame_width: u32, decor: &WindowDecorationConfig) -> Self {
        let size = decor.button_size as u32;
        let band_height = decor.titlebar_height as u32;
        let button_y = band_height.saturating_sub(size) as i32 / 2;
        let close_x = frame_width as i32 - size as i32 - decor.button_margin as i32;
        let maximize_x = close_x - decor.button_spacing as i32 - size as i32;

        Self {
            band: Geometry::new(0, 0, frame_width, band_height),
            maximize: Geometry::new(maximize_x, button_y, size, size),
            close: Geometry::new(close_x, button_y, size, size),
        }
    }

    /// Affordance boxes include their far edges
    pub fn hit(&self, x: i32, y: i32) -> TitleBarHit {
        let inside = |r: &Geometry| x >= r.x && x <= r.right() && y >= r.y && y <= r.bottom();
        if !self.band.contains_point(x, y) {
            TitleBarHit::Outside
        } else if inside(&self.close) {
            TitleBarHit::Close
        } else if inside(&self.maximize) {
            TitleBarHit::Maximize
        } else {
            TitleBarHit::Band
        }
    }

    /// Drawing steps for the band, both boxes and the title
    pub fn paint(&self, title: Option<&str>, colors: &WindowColors) -> Vec<DrawOp> {
        let mut ops = vec![DrawOp::Fill { rect: self.band, color: colors.titlebar }];

        let max = self.maximize;
        ops.push(DrawOp::Fill { rect: max, color: colors.maximize_button });
        if max.width > 6 && max.height > 6 {
            ops.push(DrawOp::Outline {
                rect: Geometry::new(max.x + 3, max.y + 3, max.width - 6, max.height - 6),
                color: colors.glyph,
            });
        }

        let close = self.close;
        ops.push(DrawOp::Fill { rect: close, color: colors.close_button });
        let inset = 4;
        ops.push(DrawOp::Line {
            from: (close.x + inset, close.y + inset),
            to: (close.right() - inset, close.bottom() - inset),
            color: colors.glyph,
        });
        ops.push(DrawOp::Line {
            from: (close.right() - inset, close.y + inset),
            to: (close.x + inset, close.bottom() - inset),
            color: colors.glyph,
        });

        if let Some(text) = title.map(|t| self.fit_title(t)).filter(|t| !t.is_empty()) {
            ops.push(DrawOp::Text {
                x: TITLE_LEFT,
                y: self.band.height as i32 / 2 + 5,
                text,
                color: colors.title_text,
            });
        }

        ops
    }

    /// Truncate so the text stops short of the maximize box
    fn fit_title(&self, title: &str) -> String {
        let room = (self.maximize.x - TITLE_LEFT - 4).max(0) / GLYPH_WIDTH;
        title.chars().take(room as usize).collect()
    }
}

impl<D: DisplayServer> WindowManager<D> {
    /// Wrap `client` in a new frame occupying `rect` and register the pair
    pub(crate) fn create_frame(&mut self, client: WindowId, rect: Geometry, client_viewable: bool) -> Result<WindowId> {
        let decor = &self.config.window_manager.decorations;
        let colors = &self.config.window_manager.colors;
        let band = decor.titlebar_height as u32;

        let frame = self.display.create_frame(rect, decor.border_width as u32, colors.border, colors.titlebar)?;

        self.display.select_client_input(client, ClientInput::Framed)?;
        if client_viewable {
            // Reparenting a mapped window unmaps it first
            self.pending_unmaps.insert(client);
        }
        self.display.reparent(client, frame, 0, band as i32)?;
        self.display.resize(client, rect.width, rect.height.saturating_sub(band))?;
        self.display.grab_focus_click(client)?;

        let gc = self.display.create_gc(frame)?;
        if gc.is_none() {
            warn!("No drawing context for frame {}, decorations will not be painted", frame);
        }
        let mut entry = Frame::new(frame, client, gc);
        entry.title = self.display.title(client)?;
        self.registry.insert(entry)?;

        self.paint_frame(frame)?;
        self.display.map(frame)?;
        self.display.map(client)?;

        debug!("Framed client {} in {} at {:?}", client, frame, rect);
        Ok(frame)
    }

    /// Repaint a frame's decorations. Silently skips unknown frames.
    pub(crate) fn paint_frame(&mut self, frame: WindowId) -> Result<()> {
        let Some(entry) = self.registry.by_frame(frame) else {
            return Ok(());
        };
        let Some(gc) = entry.gc else {
            return Ok(());
        };
        let title = entry.title.clone();
        let Some(geom) = self.display.geometry(frame)? else {
            return Ok(());
        };

        let layout = TitleBarLayout::new(geom.width, &self.config.window_manager.decorations);
        let ops = layout.paint(title.as_deref(), &self.config.window_manager.colors);
        if !self.display.draw(frame, gc, layout.band, &ops)? {
            debug!("Skipped repaint of frame {}", frame);
        }
        Ok(())
    }

    pub(crate) fn on_expose(&mut self, window: WindowId, count: u16) -> Result<()> {
        if count == 0 && self.registry.is_frame(window) {
            self.paint_frame(window)?;
        }
        Ok(())
    }

    pub(crate) fn on_title_changed(&mut self, window: WindowId) -> Result<()> {
        let Some(frame) = self.registry.by_client(window).map(|f| f.frame) else {
            return Ok(());
        };
        let title = self.display.title(window)?;
        if let Some(entry) = self.registry.by_frame_mut(frame) {
            entry.title = title;
        }
        self.paint_frame(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::wm::testing::{harness, FakeEvent};
    use pretty_assertions::assert_eq;

    fn layout(width: u32) -> TitleBarLayout {
        TitleBarLayout::new(width, &Config::default().window_manager.decorations)
    }

    #[test]
    fn test_affordances_sit_at_trailing_edge() {
        let layout = layout(800);
        assert_eq!(layout.close, Geometry::new(780, 4, 16, 16));
        assert_eq!(layout.maximize, Geometry::new(760, 4, 16, 16));
        assert_eq!(layout.band, Geometry::new(0, 0, 800, 24));
    }

    #[test]
    fn test_hit_testing() {
        let layout = layout(800);
        assert_eq!(layout.hit(785, 10), TitleBarHit::Close);
        assert_eq!(layout.hit(796, 20), TitleBarHit::Close);
        assert_eq!(layout.hit(765, 10), TitleBarHit::Maximize);
        assert_eq!(layout.hit(778, 10), TitleBarHit::Band);
        assert_eq!(layout.hit(200, 12), TitleBarHit::Band);
        assert_eq!(layout.hit(200, 30), TitleBarHit::Outside);
    }

    #[test]
    fn test_paint_without_title_draws_no_text() {
        let colors = Config::default().window_manager.colors;
        let ops = layout(800).paint(None, &colors);
        assert!(ops.iter().all(|op| !matches!(op, DrawOp::Text { .. })));
        assert_eq!(ops[0], DrawOp::Fill { rect: Geometry::new(0, 0, 800, 24), color: colors.titlebar });
    }

    #[test]
    fn test_paint_is_deterministic_and_truncates_title() {
        let colors = Config::default().window_manager.colors;
        let layout = layout(200);
        let title = "a very long window title that cannot possibly fit";
        let first = layout.paint(Some(title), &colors);
        assert_eq!(first, layout.paint(Some(title), &colors));

        let text = first.iter().find_map(|op| match op {
            DrawOp::Text { text, x, y, .. } => Some((text.clone(), *x, *y)),
            _ => None,
        });
        // maximize box starts at 160: (160 - 14) / 6 = 24 glyphs
        assert_eq!(text, Some((title.chars().take(24).collect(), 10, 17)));
    }

    #[test]
    fn test_title_change_repaints_with_new_text() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.display.window_mut(client).title = Some("before".into());
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);

        h.wm.display.window_mut(client).title = Some("after".into());
        h.wm.dispatch(FakeEvent::title(client)).unwrap();

        let (window, ops) = h.wm.display.draws.last().cloned().unwrap();
        assert_eq!(window, frame);
        assert!(ops.contains(&DrawOp::Text { x: 10, y: 17, text: "after".into(), color: 0xffffff }));
        assert_eq!(h.wm.registry.by_frame(frame).and_then(|f| f.title.clone()), Some("after".into()));
    }

    #[test]
    fn test_failed_gc_skips_painting_but_still_frames() {
        let mut h = harness(1920, 1080);
        h.wm.display.fail_gc = true;
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);

        h.wm.dispatch(FakeEvent::expose(frame)).unwrap();
        assert!(h.wm.display.draws.is_empty());
        assert!(h.wm.display.window(frame).mapped);
    }

    #[test]
    fn test_buffer_allocation_failure_skips_repaint() {
        let mut h = harness(1920, 1080);
        let client = h.wm.display.add_client(Geometry::new(0, 0, 800, 600));
        h.wm.dispatch(FakeEvent::map(client)).unwrap();
        let frame = h.frame_of(client);
        let painted = h.wm.display.draws.len();

        h.wm.display.fail_draw = true;
        h.wm.dispatch(FakeEvent::expose(frame)).unwrap();
        assert_eq!(h.wm.display.draws.len(), painted);
        assert!(h.wm.registry.by_frame(frame).is_some());

        // The next expose paints normally again
        h.wm.display.fail_draw = false;
        h.wm.dispatch(FakeEvent::expose(frame)).unwrap();
        assert_eq!(h.wm.display.draws.len(), painted + 1);
    }
}
