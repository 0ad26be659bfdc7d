//! Device managers — central-role command surfaces for downstream peripherals.
//!
//! A [`ControllableManager`] issues fire-and-forget opcode writes; a
//! [`ResponsiveManager`] additionally correlates each write with the next
//! notification on the device's response attribute. The typed wrappers in
//! [`devices`] bind a manager to one service profile and its opcode enum.

pub mod controllable;
pub mod devices;
pub mod responsive;

pub use controllable::ControllableManager;
pub use devices::{AutoFlusher, Deodorizer, LidController, PaperObserver};
pub use responsive::ResponsiveManager;
