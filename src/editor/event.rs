//! Discrete input events consumed by the editor, and what it emits back.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use super::hit::CursorShape;
use crate::model::LabeledBox;

/// Mouse button identifiers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Editor keys. Hosts map their own key codes onto these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    /// Remove the selected box, or the last one when nothing is selected.
    Delete,
    NextImage,
    PreviousImage,
    Save,
}

/// One input event. Pointer positions are in display space.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerDown {
        position: Point,
        #[serde(default)]
        button: MouseButton,
    },
    PointerMove {
        position: Point,
    },
    PointerUp {
        position: Point,
        #[serde(default)]
        button: MouseButton,
    },
    /// Wheel rotation in notches of 1/8 degree, positive away from the user.
    Wheel {
        position: Point,
        delta: f64,
    },
    Key {
        key: Key,
    },
}

impl InputEvent {
    pub fn down(x: f64, y: f64) -> Self {
        InputEvent::PointerDown {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    pub fn moved(x: f64, y: f64) -> Self {
        InputEvent::PointerMove {
            position: Point::new(x, y),
        }
    }

    pub fn up(x: f64, y: f64) -> Self {
        InputEvent::PointerUp {
            position: Point::new(x, y),
            button: MouseButton::Left,
        }
    }

    pub fn key(key: Key) -> Self {
        InputEvent::Key { key }
    }
}

/// Work the editor cannot do itself and hands to its host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostRequest {
    NextImage,
    PreviousImage,
    Save,
}

/// Result of feeding one event to the editor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EditOutcome {
    /// A gesture was committed; listeners should be told about the new box list.
    pub changed: bool,
    pub cursor: CursorShape,
    pub request: Option<HostRequest>,
}

/// Change notification: the full box list of the active image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoxesChanged {
    pub stem: String,
    pub boxes: Vec<LabeledBox>,
}
