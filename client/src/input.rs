//! Client input sampling

use log::debug;
use macroquad::prelude::*;

/// Which way the ship is being steered this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Turn {
    #[default]
    None,
    Left,
    Right,
}

/// Steering and thrust held during one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShipInput {
    pub turn: Turn,
    pub thrust: bool,
}

impl ShipInput {
    /// Left wins when both turn keys are held.
    pub fn from_keys(left: bool, right: bool, thrust: bool) -> Self {
        let turn = if left {
            Turn::Left
        } else if right {
            Turn::Right
        } else {
            Turn::None
        };
        Self { turn, thrust }
    }
}

/// Samples the keyboard once per frame
pub struct InputManager {
    current_input: ShipInput,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            current_input: ShipInput::default(),
        }
    }

    /// Reads arrow keys (or A/D/W) and returns the input for this frame.
    pub fn update(&mut self) -> ShipInput {
        let left = is_key_down(KeyCode::Left) || is_key_down(KeyCode::A);
        let right = is_key_down(KeyCode::Right) || is_key_down(KeyCode::D);
        let thrust = is_key_down(KeyCode::Up) || is_key_down(KeyCode::W);

        let input = ShipInput::from_keys(left, right, thrust);
        if input != self.current_input {
            debug!("Input changed: {:?}", input);
            self.current_input = input;
        }
        input
    }

    pub fn quit_requested(&self) -> bool {
        is_key_pressed(KeyCode::Escape)
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
