use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod codec;

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;

/// Spawn and star coordinates are drawn from `[SPAWN_MARGIN, SPAWN_MARGIN + SPAWN_RANGE)`.
pub const SPAWN_MARGIN: u32 = 50;
pub const SPAWN_RANGE_X: u32 = 700;
pub const SPAWN_RANGE_Y: u32 = 500;

/// Points a team earns for each collected star.
pub const STAR_AWARD: u32 = 10;

/// Largest payload accepted on the wire, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Transport-assigned connection identifier. Never reused while the server runs.
pub type SessionId = u64;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
    #[error("failed to encode payload: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode payload: {0}")]
    Decode(#[source] bincode::Error),
    #[error("invalid payload: {0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// RGB tint used when drawing a ship of this team.
    pub fn tint(self) -> u32 {
        match self {
            Team::Red => 0xff0000,
            Team::Blue => 0x0000ff,
        }
    }
}

/// Position and heading of a ship, as reported by its owning client.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, rotation: f32) -> Self {
        Self { x, y, rotation }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.rotation.is_finite()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerState {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub team: Team,
}

impl PlayerState {
    pub fn new(id: SessionId, x: f32, y: f32, team: Team) -> Self {
        Self {
            id,
            x,
            y,
            rotation: 0.0,
            team,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.rotation)
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.x = pose.x;
        self.y = pose.y;
        self.rotation = pose.rotation;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CollectibleState {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub red: u32,
    pub blue: u32,
}

impl ScoreState {
    pub fn award(&mut self, team: Team, points: u32) {
        match team {
            Team::Red => self.red = self.red.saturating_add(points),
            Team::Blue => self.blue = self.blue.saturating_add(points),
        }
    }

    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }
}

/// Intents sent from a client to the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientEvent {
    PlayerMovement(Pose),
    StarCollected,
}

impl ClientEvent {
    /// Rejects payloads that decoded fine but carry values no client could produce.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientEvent::PlayerMovement(pose) if !pose.is_finite() => {
                Err(ProtocolError::Invalid("movement pose is not finite"))
            }
            _ => Ok(()),
        }
    }
}

/// Events sent from the server to clients.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ServerEvent {
    /// First frame on every accepted connection.
    Welcome { session_id: SessionId },
    CurrentPlayers(HashMap<SessionId, PlayerState>),
    NewPlayer(PlayerState),
    PlayerMoved(PlayerState),
    RemovePlayer(SessionId),
    StarLocation(CollectibleState),
    ScoreUpdate(ScoreState),
    Disconnected { reason: String },
}
