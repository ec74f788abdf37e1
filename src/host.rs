//! host environment queries

use std::sync::Arc;

use parking_lot::Mutex;

use crate::model::geometry::Shape;

/// Source of this process's current on-screen geometry.
///
/// Must be a pure, cheap query with no side effects; the manager calls it
/// once per frame. The embedder supplies the real implementation backed by
/// its windowing toolkit.
pub trait HostWindow: Send {
    fn shape(&self) -> Shape;
}

/// A headless window whose geometry is driven externally. Used by the demo
/// binary and by tests; clones share the same underlying shape.
#[derive(Clone, Debug, Default)]
pub struct VirtualWindow(Arc<Mutex<Shape>>);

impl VirtualWindow {
    pub fn new(shape: Shape) -> Self {
        VirtualWindow(Arc::new(Mutex::new(shape)))
    }

    pub fn set_shape(&self, shape: Shape) {
        *self.0.lock() = shape;
    }

    /// Moves the window by the given delta, keeping its size.
    pub fn shift(&self, dx: f64, dy: f64) {
        let mut shape = self.0.lock();
        shape.x += dx;
        shape.y += dy;
    }
}

impl HostWindow for VirtualWindow {
    fn shape(&self) -> Shape {
        *self.0.lock()
    }
}
