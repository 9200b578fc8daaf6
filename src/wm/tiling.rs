//! Tiling layout
//!
//! Managed windows are laid out in arrival order against the primary
//! monitor. Rows cycle through a three-step pattern: two rows holding a pair
//! of windows side by side, then one row holding a single full-width window.
//! Every row has the same height; the last row and the right-hand cell absorb
//! integer remainders so the tiles cover the monitor exactly.

use anyhow::Result;
use tracing::debug;

use crate::shared::Geometry;
use crate::wm::backend::DisplayServer;
use crate::wm::{screen, WindowManager};

/// Window count of each row for `count` windows
fn rows(count: usize) -> Vec<usize> {
    let mut rows = Vec::new();
    let mut remaining = count;
    while remaining > 0 {
        let take = if rows.len() % 3 == 2 { 1 } else { remaining.min(2) };
        rows.push(take);
        remaining -= take;
    }
    rows
}

/// Rectangles for `count` windows, in sequence order
pub fn layout(count: usize, area: Geometry) -> Vec<Geometry> {
    match count {
        0 => return Vec::new(),
        1 => return vec![area],
        _ => {}
    }

    let rows = rows(count);
    let row_height = area.height / rows.len() as u32;
    let mut rects = Vec::with_capacity(count);

    for (index, &cells) in rows.iter().enumerate() {
        let y = area.y + (row_height * index as u32) as i32;
        let height = if index + 1 == rows.len() {
            area.height - row_height * index as u32
        } else {
            row_height
        };

        if cells == 2 {
            let left = area.width / 2;
            rects.push(Geometry::new(area.x, y, left, height));
            rects.push(Geometry::new(area.x + left as i32, y, area.width - left, height));
        } else {
            rects.push(Geometry::new(area.x, y, area.width, height));
        }
    }

    rects
}

impl<D: DisplayServer> WindowManager<D> {
    /// Re-validate the managed list and tile it. No-op unless tiling is on.
    pub(crate) fn retile(&mut self) -> Result<()> {
        if !self.tiling {
            return Ok(());
        }

        // Destroy notifications can race layout triggers
        let mut gone = Vec::new();
        for &window in &self.managed {
            let client = self.registry.by_frame(window).map_or(window, |f| f.client);
            if self.display.window_attributes(client)?.is_none() {
                gone.push(client);
            }
        }
        // Forget by client so a framed window's frame is torn down too
        for client in gone {
            debug!("Dropping vanished window {} from tiling", client);
            self.forget(client)?;
        }

        let area = screen::primary_monitor(&mut self.display);
        let windows = self.managed.clone();
        for (window, rect) in windows.into_iter().zip(layout(self.managed.len(), area)) {
            self.place(window, rect)?;
        }
        Ok(())
    }
}
