//! Application layer use cases for the relay.
//!
//! Use cases in this layer orchestrate domain objects from `pointer_core` and
//! depend on traits rather than concrete infrastructure, so they can be unit
//! tested with recording doubles.
//!
//! # Sub-modules
//!
//! - **`publish_events`** – Turns capture callbacks into `mouse`/`click`
//!   frames, throttling position updates and never throttling clicks.  Runs
//!   on every pointer event.
//!
//! - **`lifecycle`** – Starts and stops the capture subscription and the
//!   overlay connection together in response to host hooks and config
//!   changes.

pub mod lifecycle;
pub mod publish_events;
