//! Integration tests for the overlay wire format.
//!
//! These tests drive the public API the way the relay does: mutate a
//! [`PointerState`], build an [`OutboundMessage`] from it, and check the JSON
//! text an overlay would receive.  The overlay parses frames by their `"type"`
//! field, so every assertion goes through `serde_json::Value` rather than
//! comparing whole strings.

use pointer_core::{ButtonId, ButtonStates, OutboundMessage, PointerState};
use serde_json::Value;

fn parse(msg: &OutboundMessage) -> Value {
    serde_json::from_str(&msg.to_json().expect("serialize")).expect("valid JSON")
}

#[test]
fn test_mouse_frame_contains_exactly_the_overlay_fields() {
    // Arrange
    let mut state = PointerState::new();
    state.move_to(640.0, 360.0);

    // Act
    let value = parse(&OutboundMessage::mouse(&state));

    // Assert
    let obj = value.as_object().expect("object");
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["buttons", "type", "x", "y"]);
    assert_eq!(value["type"], "mouse");
    assert_eq!(value["x"], 640);
    assert_eq!(value["y"], 360);

    let buttons = value["buttons"].as_object().expect("buttons object");
    assert_eq!(buttons.len(), 3);
    for id in ButtonId::ALL {
        assert_eq!(buttons[id.as_str()], Value::Bool(false));
    }
}

#[test]
fn test_click_frame_contains_exactly_the_overlay_fields() {
    // Arrange
    let mut state = PointerState::new();
    state.move_to(50.0, 60.0);
    state.apply_button("left", true).expect("tracked button");

    // Act
    let value = parse(&OutboundMessage::click("left", true, &state));

    // Assert
    let obj = value.as_object().expect("object");
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["button", "pressed", "type", "x", "y"]);
    assert_eq!(value["type"], "click");
    assert_eq!(value["button"], "left");
    assert_eq!(value["pressed"], true);
    assert_eq!(value["x"], 50);
    assert_eq!(value["y"], 60);
}

#[test]
fn test_press_then_release_is_reflected_in_following_mouse_frames() {
    // Arrange
    let mut state = PointerState::new();

    // Act
    state.apply_button("right", true).unwrap();
    let held = parse(&OutboundMessage::mouse(&state));
    state.apply_button("right", false).unwrap();
    let released = parse(&OutboundMessage::mouse(&state));

    // Assert
    assert_eq!(held["buttons"]["right"], true);
    assert_eq!(released["buttons"]["right"], false);
}

#[test]
fn test_untracked_button_click_keeps_raw_identifier() {
    // Arrange
    let mut state = PointerState::new();
    let rejected = state.apply_button("x1", true);

    // Act
    let value = parse(&OutboundMessage::click("x1", true, &state));

    // Assert
    assert!(rejected.is_err());
    assert_eq!(value["button"], "x1");
    assert_eq!(state.buttons, ButtonStates::default());
}

#[test]
fn test_frames_deserialize_back_by_type_tag() {
    // The overlay side dispatches on "type"; make sure the tag alone is enough.
    let frame = r#"{"type":"click","button":"middle","pressed":false,"x":-3,"y":7}"#;
    let msg: OutboundMessage = serde_json::from_str(frame).expect("deserialize");
    assert_eq!(msg.type_name(), "click");
    assert!(!msg.is_continuous());
}
