//! In-memory driver
//!
//! Implements the [`crate::driver`] traits over JSON documents held in
//! process. Backs the CLI (`--data DIR`) and the test suites.
//!
//! Supported query operators are the ones a [`crate::Filter`] can emit.
//! Geometry is evaluated on a flat plane.

mod database;
mod driver;
mod geometry;
mod matcher;
mod projection;

pub use database::{MemoryCollection, MemoryDatabase};
pub use driver::MemoryDriver;
pub use matcher::Matcher;
