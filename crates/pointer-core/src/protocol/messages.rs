//! JSON text frames sent to the overlay.
//!
//! Every frame is one flat JSON object with a `"type"` discriminant; numeric
//! fields are integers and flags are booleans.  The only nested object is
//! `buttons`.
//!
//! ```json
//! {"type":"mouse","x":100,"y":200,"buttons":{"left":false,"right":false,"middle":false}}
//! {"type":"click","button":"left","pressed":true,"x":100,"y":200}
//! ```
//!
//! `#[serde(tag = "type")]` writes the discriminant first, followed by the
//! variant's fields in declaration order.

use serde::{Deserialize, Serialize};

use crate::domain::pointer::{ButtonStates, PointerState};

/// Continuous position update: where the pointer is and which buttons are held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseMessage {
    pub x: i32,
    pub y: i32,
    pub buttons: ButtonStates,
}

/// Discrete button transition.
///
/// `button` carries the identifier exactly as the capture source reported it,
/// so transitions of untracked buttons still reach the overlay even though they
/// never enter [`ButtonStates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickMessage {
    pub button: String,
    pub pressed: bool,
    pub x: i32,
    pub y: i32,
}

/// Every frame the relay can send to the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Mouse(MouseMessage),
    Click(ClickMessage),
}

impl OutboundMessage {
    /// Builds a `mouse` frame from the current pointer snapshot.
    pub fn mouse(state: &PointerState) -> Self {
        OutboundMessage::Mouse(MouseMessage {
            x: state.x,
            y: state.y,
            buttons: state.buttons,
        })
    }

    /// Builds a `click` frame for a transition of `button` at the current position.
    pub fn click(button: &str, pressed: bool, state: &PointerState) -> Self {
        OutboundMessage::Click(ClickMessage {
            button: button.to_string(),
            pressed,
            x: state.x,
            y: state.y,
        })
    }

    /// Returns `true` for high-frequency frames that may be throttled.
    pub fn is_continuous(&self) -> bool {
        matches!(self, OutboundMessage::Mouse(_))
    }

    /// Returns the `"type"` discriminant as written on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Mouse(_) => "mouse",
            OutboundMessage::Click(_) => "click",
        }
    }

    /// Serializes the frame to its JSON text form.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error; with the current message
    /// shapes this cannot happen in practice.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
