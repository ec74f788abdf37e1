//! Shared-store window registry synchronization.
//!
//! Coordinates multiple independent processes of the same user so they can
//! cooperatively render one logical scene spanning physical screen space.
//! There is no coordinator: every process runs the same program and the only
//! communication substrate is a shared key-value store that notifies the
//! *other* processes when a value changes. On top of that substrate this
//! crate maintains an eventually-consistent registry of window identities and
//! screen geometry, and derives nested-shape containment facts from it.
//!
//! The rendering side of such a scene is deliberately out of scope; it drives
//! [`manager::WindowManager::update`] once per frame and consumes
//! [`manager::WindowManager::windows`].

pub mod common;
pub mod host;
pub mod manager;
pub mod model;
pub mod store;
