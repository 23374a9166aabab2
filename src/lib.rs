//! Camera-driven hand-gesture play engine.
//!
//! A [`detector::LandmarkDetector`] feeds 21-point hands into an
//! [`engine::Engine`], which smooths them, classifies gestures for the
//! active [`modes::Mode`], steps that mode's physics and reports events,
//! effects and sounds to an [`actions::ActionSink`].

pub mod actions;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod gestures;
pub mod interaction;
pub mod ipc;
pub mod landmarks;
pub mod logging;
pub mod modes;
pub mod physics;
pub mod session;
pub mod tracker;

pub use engine::Engine;
pub use modes::Mode;
