//! Authoritative game state and the handlers that mutate it
//!
//! `GameState` owns every player, the star and the team scores. Handlers
//! never touch the network directly: each one mutates state and returns the
//! [`Outbound`] events the network layer must deliver, in order.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    ClientEvent, CollectibleState, PlayerState, Pose, ScoreState, ServerEvent, SessionId, Team,
    SPAWN_MARGIN, SPAWN_RANGE_X, SPAWN_RANGE_Y, STAR_AWARD,
};
use std::collections::HashMap;

/// A server event together with the sessions that should receive it
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    To {
        session_id: SessionId,
        event: ServerEvent,
    },
    Broadcast {
        event: ServerEvent,
        exclude: Option<SessionId>,
    },
}

#[derive(Debug, Clone)]
pub struct GameState {
    players: HashMap<SessionId, PlayerState>,
    star: CollectibleState,
    scores: ScoreState,
    rng: StdRng,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates a state whose spawn points, teams and star positions are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let (x, y) = random_position(&mut rng);
        Self {
            players: HashMap::new(),
            star: CollectibleState { x, y },
            scores: ScoreState::default(),
            rng,
        }
    }

    pub fn players(&self) -> &HashMap<SessionId, PlayerState> {
        &self.players
    }

    pub fn player(&self, session_id: SessionId) -> Option<&PlayerState> {
        self.players.get(&session_id)
    }

    pub fn star(&self) -> CollectibleState {
        self.star
    }

    pub fn scores(&self) -> ScoreState {
        self.scores
    }

    /// Spawns a player for a fresh session.
    ///
    /// The new session gets its id, the full roster, the star and the scores;
    /// everyone else only learns about the new player.
    pub fn handle_connect(&mut self, session_id: SessionId) -> Vec<Outbound> {
        let (x, y) = random_position(&mut self.rng);
        let team = if self.rng.gen_bool(0.5) {
            Team::Red
        } else {
            Team::Blue
        };

        let player = PlayerState::new(session_id, x, y, team);
        info!(
            "Added player {} on {:?} at ({}, {})",
            session_id, team, player.x, player.y
        );
        self.players.insert(session_id, player.clone());

        vec![
            Outbound::To {
                session_id,
                event: ServerEvent::Welcome { session_id },
            },
            Outbound::To {
                session_id,
                event: ServerEvent::CurrentPlayers(self.players.clone()),
            },
            Outbound::To {
                session_id,
                event: ServerEvent::StarLocation(self.star),
            },
            Outbound::To {
                session_id,
                event: ServerEvent::ScoreUpdate(self.scores),
            },
            Outbound::Broadcast {
                event: ServerEvent::NewPlayer(player),
                exclude: Some(session_id),
            },
        ]
    }

    pub fn handle_disconnect(&mut self, session_id: SessionId) -> Vec<Outbound> {
        if self.players.remove(&session_id).is_none() {
            debug!("Disconnect for unknown session {}", session_id);
            return Vec::new();
        }

        info!("Removed player {}", session_id);
        vec![Outbound::Broadcast {
            event: ServerEvent::RemovePlayer(session_id),
            exclude: None,
        }]
    }

    /// Overwrites the player's pose with whatever the client reported.
    pub fn handle_movement(&mut self, session_id: SessionId, pose: Pose) -> Vec<Outbound> {
        let Some(player) = self.players.get_mut(&session_id) else {
            debug!("Movement from unknown session {}", session_id);
            return Vec::new();
        };

        player.set_pose(pose);
        vec![Outbound::Broadcast {
            event: ServerEvent::PlayerMoved(player.clone()),
            exclude: Some(session_id),
        }]
    }

    /// Awards the collecting player's team and moves the star.
    ///
    /// Claims are not checked against the star's position, so two clients
    /// claiming the same star both score.
    pub fn handle_star_collected(&mut self, session_id: SessionId) -> Vec<Outbound> {
        let Some(team) = self.players.get(&session_id).map(|p| p.team) else {
            debug!("Star claim from unknown session {}", session_id);
            return Vec::new();
        };

        self.scores.award(team, STAR_AWARD);
        let (x, y) = random_position(&mut self.rng);
        self.star = CollectibleState { x, y };
        info!(
            "Player {} collected the star for {:?}, scores red={} blue={}",
            session_id, team, self.scores.red, self.scores.blue
        );

        vec![
            Outbound::Broadcast {
                event: ServerEvent::StarLocation(self.star),
                exclude: None,
            },
            Outbound::Broadcast {
                event: ServerEvent::ScoreUpdate(self.scores),
                exclude: None,
            },
        ]
    }

    pub fn handle_event(&mut self, session_id: SessionId, event: ClientEvent) -> Vec<Outbound> {
        match event {
            ClientEvent::PlayerMovement(pose) => self.handle_movement(session_id, pose),
            ClientEvent::StarCollected => self.handle_star_collected(session_id),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

fn random_position(rng: &mut StdRng) -> (f32, f32) {
    let x = rng.gen_range(0..SPAWN_RANGE_X) + SPAWN_MARGIN;
    let y = rng.gen_range(0..SPAWN_RANGE_Y) + SPAWN_MARGIN;
    (x as f32, y as f32)
}
