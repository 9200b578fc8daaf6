//! Window and output rectangles
//!
//! Every rectangle lives in the root window's coordinate space unless a
//! caller says otherwise (frame-relative positions use the same type).

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge
    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Center point, rounded towards the top-left
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Area of the overlap with `other`, zero when disjoint
    pub fn intersection_area(&self, other: &Geometry) -> u64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return 0;
        }
        (right - left) as u64 * (bottom - top) as u64
    }

    pub fn intersects(&self, other: &Geometry) -> bool {
        self.intersection_area(other) > 0
    }

    /// A `width` x `height` rectangle centered inside `self`.
    ///
    /// Oversized rectangles are pinned to the top-left of `self` rather than
    /// pushed off-screen.
    pub fn centered(&self, width: u32, height: u32) -> Geometry {
        let x = self.x + (self.width.saturating_sub(width) / 2) as i32;
        let y = self.y + (self.height.saturating_sub(height) / 2) as i32;
        Geometry::new(x, y, width, height)
    }

    pub fn with_position(self, x: i32, y: i32) -> Geometry {
        Geometry { x, y, ..self }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
