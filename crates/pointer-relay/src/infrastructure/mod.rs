//! Infrastructure layer for the relay.
//!
//! Contains the adapters that touch the outside world: capture sources, the
//! WebSocket connection, and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `pointer_core`, but MUST NOT be imported by the domain.

pub mod input_capture;
pub mod network;
pub mod storage;
