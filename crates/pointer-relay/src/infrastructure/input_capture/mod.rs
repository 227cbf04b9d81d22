//! Pointer capture sources.
//!
//! A capture source owns whatever produces raw pointer callbacks (a platform
//! hook, a replay file, a test harness) and hands them to the relay through a
//! `std::sync::mpsc` channel.  The lifecycle controller drains that channel on
//! a dedicated pump thread, so a source never calls into the publisher
//! directly and never needs to know about the network.
//!
//! # Testability
//!
//! The [`PointerSource`] trait lets tests inject synthetic events through
//! [`mock::MockPointerSource`] without any input backend.

use std::sync::mpsc;

use serde::Deserialize;

pub mod line_source;
pub mod mock;

/// A raw pointer callback as produced by a capture backend.
///
/// Coordinates are kept as reported (often fractional); the publisher converts
/// them to integer screen coordinates.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum RawPointerEvent {
    /// The pointer moved to an absolute position.
    Move { x: f64, y: f64 },
    /// A button changed state at an absolute position.
    Button {
        x: f64,
        y: f64,
        /// Backend identifier, e.g. `"left"`; untracked ids are tolerated.
        button: String,
        pressed: bool,
    },
}

/// Error type for capture sources.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// A capability the source depends on is missing.  Terminal for the session.
    #[error("capture source unavailable: {0}")]
    Unavailable(String),
    /// The source exists but could not begin delivering events.
    #[error("failed to start capture: {0}")]
    StartFailed(String),
}

/// Trait abstracting pointer event production.
pub trait PointerSource: Send + Sync {
    /// Checks once, at load time, that the source can work at all.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Unavailable`] when a required capability is missing.
    fn probe(&self) -> Result<(), CaptureError>;

    /// Begins delivering events and returns the receiving end.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] if the subscription cannot be established.
    fn start(&self) -> Result<mpsc::Receiver<RawPointerEvent>, CaptureError>;

    /// Stops delivering events.  Must tolerate being called when not started.
    fn stop(&self);
}
