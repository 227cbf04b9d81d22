//! Live pointer state: position plus the three tracked buttons.
//!
//! Capture backends report coordinates as floating-point numbers and buttons
//! as free-form identifiers.  This module narrows both into the shapes the
//! overlay understands: integer screen coordinates and a fixed
//! `left`/`right`/`middle` button map.  Identifiers outside that set are
//! reported as [`UnsupportedButton`] and never extend the map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A button the overlay tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonId {
    Left,
    Right,
    Middle,
}

impl ButtonId {
    /// All tracked buttons, in wire order.
    pub const ALL: [ButtonId; 3] = [ButtonId::Left, ButtonId::Right, ButtonId::Middle];

    /// Returns the identifier used on the wire and by capture sources.
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonId::Left => "left",
            ButtonId::Right => "right",
            ButtonId::Middle => "middle",
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a capture source reports a button outside [`ButtonId`].
///
/// This is not a failure: callers log it and carry on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported button identifier {0:?}")]
pub struct UnsupportedButton(pub String);

impl FromStr for ButtonId {
    type Err = UnsupportedButton;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(ButtonId::Left),
            "right" => Ok(ButtonId::Right),
            "middle" => Ok(ButtonId::Middle),
            other => Err(UnsupportedButton(other.to_string())),
        }
    }
}

/// Pressed/released state of every tracked button.
///
/// Serializes as `{"left":bool,"right":bool,"middle":bool}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonStates {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

impl ButtonStates {
    /// Records a transition for `button`.
    pub fn set(&mut self, button: ButtonId, pressed: bool) {
        match button {
            ButtonId::Left => self.left = pressed,
            ButtonId::Right => self.right = pressed,
            ButtonId::Middle => self.middle = pressed,
        }
    }
}

/// The one live pointer snapshot of a relay session.
///
/// Mutated in place by every capture callback and read when a message is
/// built.  No history is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerState {
    pub x: i32,
    pub y: i32,
    pub buttons: ButtonStates,
}

impl PointerState {
    /// Creates a pointer at the origin with no buttons held.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the pointer to the capture-space position `(x, y)`.
    ///
    /// Fractional coordinates are truncated toward zero; non-finite values
    /// saturate (`NaN` becomes 0).
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.x = to_coordinate(x);
        self.y = to_coordinate(y);
    }

    /// Applies a button transition reported by a capture source.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedButton`] when `button` is not one of the tracked
    /// identifiers.  The button map is left untouched in that case.
    pub fn apply_button(&mut self, button: &str, pressed: bool) -> Result<ButtonId, UnsupportedButton> {
        let id: ButtonId = button.parse()?;
        self.buttons.set(id, pressed);
        Ok(id)
    }
}

/// Converts a capture coordinate into an integer screen coordinate.
pub fn to_coordinate(value: f64) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to 0.
    value as i32
}

// ── Tests ─────────────────────────────────────────────────────────────────────
