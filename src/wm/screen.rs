//! Screen Module
//!
//! Monitor geometry resolution against the RandR output topology.
//!
//! Nothing here is cached: every query asks the display server for a fresh
//! output list, because outputs can be reconfigured or unplugged between two
//! events. Outputs without an active mode never match.

use tracing::debug;

use crate::shared::Geometry;
use crate::wm::backend::{DisplayServer, Output};

fn active(outputs: &[Output]) -> impl Iterator<Item = &Output> {
    outputs.iter().filter(|o| o.active)
}

/// Output whose rectangle contains the center of `window`
pub fn containing_center(outputs: &[Output], window: &Geometry) -> Option<Geometry> {
    let (cx, cy) = window.center();
    active(outputs)
        .find(|o| o.rect.contains_point(cx, cy))
        .map(|o| o.rect)
}

/// Declared primary output, else the first active one
pub fn primary(outputs: &[Output]) -> Option<Geometry> {
    active(outputs)
        .find(|o| o.primary)
        .or_else(|| active(outputs).next())
        .map(|o| o.rect)
}

/// Output with the largest intersection with `window`.
///
/// Ties go to the output enumerated first. No overlap at all is a miss.
pub fn best_overlap(outputs: &[Output], window: &Geometry) -> Option<Geometry> {
    let mut best: Option<(&Output, u64)> = None;
    for output in active(outputs) {
        let area = output.rect.intersection_area(window);
        if area == 0 {
            continue;
        }
        match best {
            Some((_, best_area)) if best_area >= area => {}
            _ => best = Some((output, area)),
        }
    }
    best.map(|(o, _)| o.rect)
}

fn fetch<D: DisplayServer>(display: &mut D) -> Vec<Output> {
    match display.outputs() {
        Ok(outputs) => outputs,
        Err(e) => {
            debug!("Output query failed: {}", e);
            Vec::new()
        }
    }
}

/// Monitor holding the window's center, or the whole desktop
pub fn monitor_for_window<D: DisplayServer>(display: &mut D, window: &Geometry) -> Geometry {
    containing_center(&fetch(display), window).unwrap_or_else(|| {
        debug!("No output contains center of {:?}, using desktop", window);
        display.desktop()
    })
}

/// Primary monitor, or the whole desktop
pub fn primary_monitor<D: DisplayServer>(display: &mut D) -> Geometry {
    primary(&fetch(display)).unwrap_or_else(|| {
        debug!("No active outputs, using desktop");
        display.desktop()
    })
}

/// Monitor overlapping the window most, or the whole desktop
pub fn best_overlap_monitor<D: DisplayServer>(display: &mut D, window: &Geometry) -> Geometry {
    best_overlap(&fetch(display), window).unwrap_or_else(|| {
        debug!("No output overlaps {:?}, using desktop", window);
        display.desktop()
    })
}
