//! 几何分类器
//! Half-plane classification of a point against the boundary line

use serde::{Deserialize, Serialize};

/// 二维点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// 分界线两侧
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

/// 计数分界线 (会话期间不可变)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryLine {
    a: Point2,
    b: Point2,
}

impl BoundaryLine {
    pub fn new(a: Point2, b: Point2) -> Self {
        Self { a, b }
    }

    /// `[x1, y1, x2, y2]`
    pub fn from_coords(coords: [f64; 4]) -> Self {
        Self::new(
            Point2::new(coords[0], coords[1]),
            Point2::new(coords[2], coords[3]),
        )
    }

    pub fn start(&self) -> Point2 {
        self.a
    }

    pub fn end(&self) -> Point2 {
        self.b
    }

    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    /// Signed cross product of the line direction with `a → point`.
    pub fn side_of(&self, point: Point2) -> f64 {
        side_of(point, self)
    }

    pub fn classify(&self, point: Point2) -> Side {
        side_from_signed(self.side_of(point))
    }
}

pub fn side_of(point: Point2, line: &BoundaryLine) -> f64 {
    let (a, b) = (line.a, line.b);
    (b.x - a.x) * (point.y - a.y) - (b.y - a.y) * (point.x - a.x)
}

/// 正值为A侧; 零 (点在线上) 与负值都归为B侧
pub fn side_from_signed(signed: f64) -> Side {
    if signed > 0.0 {
        Side::A
    } else {
        Side::B
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertical() -> BoundaryLine {
        BoundaryLine::from_coords([640.0, 0.0, 640.0, 720.0])
    }

    #[test]
    fn test_vertical_line_sides() {
        let line = vertical();
        // (0,720) x (dx,dy): 0*(py) - 720*(px-640)
        assert_eq!(line.classify(Point2::new(600.0, 360.0)), Side::A);
        assert_eq!(line.classify(Point2::new(680.0, 360.0)), Side::B);
    }

    #[test]
    fn test_point_on_line_is_side_b() {
        let line = vertical();
        for y in [0.0, 1.5, 360.0, 720.0, 9999.0] {
            let p = Point2::new(640.0, y);
            assert_eq!(line.side_of(p), 0.0);
            assert_eq!(line.classify(p), Side::B);
        }
        // Endpoints of a diagonal line too
        let diag = BoundaryLine::from_coords([0.0, 0.0, 100.0, 100.0]);
        assert_eq!(diag.classify(Point2::new(50.0, 50.0)), Side::B);
        assert_eq!(diag.classify(diag.start()), Side::B);
        assert_eq!(diag.classify(diag.end()), Side::B);
    }

    #[test]
    fn test_cross_product_value() {
        let line = BoundaryLine::from_coords([0.0, 0.0, 10.0, 0.0]);
        assert_eq!(line.side_of(Point2::new(3.0, 2.0)), 20.0);
        assert_eq!(line.side_of(Point2::new(3.0, -2.0)), -20.0);
        assert_eq!(side_from_signed(20.0), Side::A);
        assert_eq!(side_from_signed(-20.0), Side::B);
        assert_eq!(side_from_signed(0.0), Side::B);
        assert_eq!(side_from_signed(-0.0), Side::B);
    }

    #[test]
    fn test_degenerate_line() {
        assert!(BoundaryLine::from_coords([5.0, 5.0, 5.0, 5.0]).is_degenerate());
        assert!(!vertical().is_degenerate());
    }
}
