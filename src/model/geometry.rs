//! screen-space window geometry and the nested-shape analysis

use serde::{Deserialize, Serialize};

/// Number of nested windows at which the analysis flags the scene.
pub const NESTED_ALERT_THRESHOLD: usize = 3;

/// A window's on-screen rectangle: position of the top-left corner plus
/// viewport size, in screen coordinates.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Shape {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Shape {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Shape { x, y, w, h }
    }

    /// Boundary-inclusive containment of `self` inside `other`.
    ///
    /// A shape is inside an identical shape, including itself; collection
    /// scans must exclude self-comparison by index, not by value equality.
    pub fn is_inside(&self, other: &Shape) -> bool {
        self.x >= other.x
            && self.y >= other.y
            && self.x + self.w <= other.x + other.w
            && self.y + self.h <= other.y + other.h
    }
}

/// Result of one nested-shape pass over the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NestedReport {
    /// Windows contained inside at least one other window.
    pub count: usize,
}

impl NestedReport {
    pub fn analyze(shapes: &[Shape]) -> Self {
        NestedReport { count: nested_shape_count(shapes) }
    }

    /// Whether to surface the scene to the user is a presentation decision;
    /// the core only reports that the threshold was reached.
    pub fn threshold_reached(&self) -> bool {
        self.count >= NESTED_ALERT_THRESHOLD
    }
}

/// Counts shapes that lie entirely inside at least one *other* shape.
///
/// Each shape is counted once, no matter how many shapes contain it. O(n²)
/// pairwise scans per call, acceptable since n is bounded by how many windows
/// a user actually opens.
pub fn nested_shape_count(shapes: &[Shape]) -> usize {
    let mut nested = 0;
    for (i, shape) in shapes.iter().enumerate() {
        let contained = shapes
            .iter()
            .enumerate()
            .any(|(j, other)| j != i && shape.is_inside(other));
        if contained {
            nested += 1;
        }
    }
    nested
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_identical_shapes_contain_each_other() {
        let a = Shape::new(0.0, 0.0, 10.0, 10.0);
        let b = Shape::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.is_inside(&b));
        assert!(b.is_inside(&a));
    }

    #[test]
    fn test_overhang_is_not_contained() {
        let a = Shape::new(1.0, 0.0, 10.0, 10.0);
        let b = Shape::new(0.0, 0.0, 10.0, 10.0);
        // extends one unit past b's right edge
        assert!(!a.is_inside(&b));
    }

    #[test]
    fn test_strict_containment() {
        let outer = Shape::new(0.0, 0.0, 100.0, 100.0);
        let inner = Shape::new(10.0, 10.0, 80.0, 80.0);
        assert!(inner.is_inside(&outer));
        assert!(!outer.is_inside(&inner));
    }

    #[test]
    fn test_boundary_touching_is_contained() {
        let outer = Shape::new(0.0, 0.0, 100.0, 100.0);
        let flush = Shape::new(50.0, 0.0, 50.0, 100.0);
        assert!(flush.is_inside(&outer));
    }

    #[test]
    fn test_nested_count_reaches_threshold() {
        let outer = Shape::new(0.0, 0.0, 1000.0, 1000.0);
        let shapes = vec![
            Shape::new(10.0, 10.0, 100.0, 100.0),
            Shape::new(200.0, 200.0, 100.0, 100.0),
            Shape::new(400.0, 400.0, 100.0, 100.0),
            outer,
        ];
        let report = NestedReport::analyze(&shapes);
        assert_eq!(report.count, 3);
        assert!(report.threshold_reached());
    }

    #[test]
    fn test_nested_count_below_threshold() {
        let shapes = vec![
            Shape::new(10.0, 10.0, 100.0, 100.0),
            Shape::new(200.0, 200.0, 100.0, 100.0),
            Shape::new(0.0, 0.0, 1000.0, 1000.0),
        ];
        let report = NestedReport::analyze(&shapes);
        assert_eq!(report.count, 2);
        assert!(!report.threshold_reached());
    }

    #[test]
    fn test_nested_count_excludes_self_comparison() {
        // A lone shape is trivially inside itself but must not be counted.
        assert_eq!(nested_shape_count(&[Shape::new(0.0, 0.0, 10.0, 10.0)]), 0);

        // Two identical shapes each lie inside the *other*, so both count.
        let twin = Shape::new(5.0, 5.0, 20.0, 20.0);
        assert_eq!(nested_shape_count(&[twin, twin]), 2);
    }

    #[test]
    fn test_nested_count_counts_each_window_once() {
        // Innermost is inside both outer shapes but still counts once.
        let shapes = vec![
            Shape::new(20.0, 20.0, 10.0, 10.0),
            Shape::new(10.0, 10.0, 100.0, 100.0),
            Shape::new(0.0, 0.0, 1000.0, 1000.0),
        ];
        assert_eq!(nested_shape_count(&shapes), 2);
    }

    #[test]
    fn test_nested_count_empty() {
        assert_eq!(nested_shape_count(&[]), 0);
    }
}
