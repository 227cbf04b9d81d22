//! Domain entities for pointer-relay.
//!
//! Pure data and rules with no infrastructure dependencies: what the pointer
//! looks like right now, which buttons exist, and what the relay is configured
//! to do.  Outer layers (capture, network, storage) depend on this module, but
//! it never depends on them.

/// Runtime configuration and its shared holder.
pub mod config;

/// Overlay connection states.
pub mod connection;

/// Live pointer position and button state.
pub mod pointer;
