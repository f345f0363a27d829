use crate::input::{ShipInput, Turn};
use log::{debug, warn};
use shared::{
    ClientEvent, PlayerState, Pose, ScoreState, ServerEvent, SessionId, Team, WORLD_HEIGHT,
    WORLD_WIDTH,
};
use std::collections::HashMap;
use std::f32::consts::PI;

/// Degrees per second while a turn key is held.
pub const TURN_RATE: f32 = 150.0;
/// Acceleration while thrusting, px/s².
pub const THRUST: f32 = 100.0;
/// The ship sprite points "up", so thrust is applied this far from `rotation`.
pub const THRUST_ANGLE_OFFSET: f32 = 1.5;
/// Linear deceleration when not thrusting, px/s².
pub const DRAG: f32 = 100.0;
/// Per-axis speed cap, px/s.
pub const MAX_VELOCITY: f32 = 200.0;
/// How far past the edge a ship travels before appearing on the other side.
pub const WRAP_PADDING: f32 = 5.0;

pub const SHIP_WIDTH: f32 = 53.0;
pub const SHIP_HEIGHT: f32 = 40.0;
pub const STAR_SIZE: f32 = 30.0;

/// The locally controlled ship
#[derive(Debug, Clone)]
pub struct Ship {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub team: Team,
    last_reported: Pose,
}

impl Ship {
    pub fn new(state: &PlayerState) -> Self {
        Self {
            x: state.x,
            y: state.y,
            rotation: state.rotation,
            vel_x: 0.0,
            vel_y: 0.0,
            team: state.team,
            last_reported: state.pose(),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.rotation)
    }

    pub fn step(&mut self, input: &ShipInput, dt: f32) {
        let angular_velocity = match input.turn {
            Turn::Left => -TURN_RATE,
            Turn::Right => TURN_RATE,
            Turn::None => 0.0,
        };
        self.rotation = wrap(self.rotation + angular_velocity.to_radians() * dt, -PI, PI);

        if input.thrust {
            let heading = self.rotation + THRUST_ANGLE_OFFSET;
            self.vel_x += -THRUST * heading.cos() * dt;
            self.vel_y += -THRUST * heading.sin() * dt;
        } else {
            self.vel_x = apply_drag(self.vel_x, DRAG * dt);
            self.vel_y = apply_drag(self.vel_y, DRAG * dt);
        }

        self.vel_x = self.vel_x.clamp(-MAX_VELOCITY, MAX_VELOCITY);
        self.vel_y = self.vel_y.clamp(-MAX_VELOCITY, MAX_VELOCITY);

        self.x = wrap(
            self.x + self.vel_x * dt,
            -WRAP_PADDING,
            WORLD_WIDTH + WRAP_PADDING,
        );
        self.y = wrap(
            self.y + self.vel_y * dt,
            -WRAP_PADDING,
            WORLD_HEIGHT + WRAP_PADDING,
        );
    }

    /// Returns the current pose if it differs from the last one reported.
    pub fn take_movement(&mut self) -> Option<Pose> {
        let pose = self.pose();
        if pose == self.last_reported {
            return None;
        }
        self.last_reported = pose;
        Some(pose)
    }
}

/// Another session's ship, as last reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub team: Team,
}

impl RemotePlayer {
    pub fn from_state(state: &PlayerState) -> Self {
        Self {
            id: state.id,
            x: state.x,
            y: state.y,
            rotation: state.rotation,
            team: state.team,
        }
    }

    fn snap_to(&mut self, state: &PlayerState) {
        self.x = state.x;
        self.y = state.y;
        self.rotation = state.rotation;
    }
}

/// One placement of the star; a relocation creates a new generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub x: f32,
    pub y: f32,
    pub generation: u64,
}

/// Everything one client knows about the game
#[derive(Debug, Default)]
pub struct ClientGameState {
    pub session_id: Option<SessionId>,
    pub ship: Option<Ship>,
    pub remote_players: HashMap<SessionId, RemotePlayer>,
    pub star: Option<Star>,
    pub scores: Option<ScoreState>,
    star_generation: u64,
    claimed_generation: Option<u64>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Welcome { session_id } => {
                debug!("Assigned session {}", session_id);
                self.session_id = Some(session_id);
            }
            ServerEvent::CurrentPlayers(players) => {
                if self.session_id.is_none() {
                    warn!("Roster arrived before our session id, treating every player as remote");
                }
                for (id, player) in players {
                    if Some(id) == self.session_id {
                        self.ship = Some(Ship::new(&player));
                    } else {
                        self.add_remote_player(&player);
                    }
                }
            }
            ServerEvent::NewPlayer(player) => {
                if Some(player.id) == self.session_id {
                    debug!("Ignoring new-player announcement about ourselves");
                } else {
                    self.add_remote_player(&player);
                }
            }
            ServerEvent::PlayerMoved(player) => match self.remote_players.get_mut(&player.id) {
                Some(remote) => remote.snap_to(&player),
                None => debug!("Movement for unknown player {}", player.id),
            },
            ServerEvent::RemovePlayer(id) => {
                if self.remote_players.remove(&id).is_none() {
                    debug!("Remove for unknown player {}", id);
                }
            }
            ServerEvent::StarLocation(location) => {
                self.star_generation += 1;
                self.star = Some(Star {
                    x: location.x,
                    y: location.y,
                    generation: self.star_generation,
                });
            }
            ServerEvent::ScoreUpdate(scores) => {
                self.scores = Some(scores);
            }
            ServerEvent::Disconnected { reason } => {
                warn!("Server closed our session: {}", reason);
            }
        }
    }

    fn add_remote_player(&mut self, player: &PlayerState) {
        self.remote_players
            .insert(player.id, RemotePlayer::from_state(player));
    }

    /// Advances the local ship by one frame and returns the intents to send.
    pub fn update(&mut self, input: &ShipInput, dt: f32) -> Vec<ClientEvent> {
        let mut intents = Vec::new();
        let Some(ship) = self.ship.as_mut() else {
            return intents;
        };

        ship.step(input, dt);
        if let Some(pose) = ship.take_movement() {
            intents.push(ClientEvent::PlayerMovement(pose));
        }

        if let Some(claim) = self.check_star_overlap() {
            intents.push(claim);
        }
        intents
    }

    /// Claims the current star at most once, however long the overlap lasts.
    fn check_star_overlap(&mut self) -> Option<ClientEvent> {
        let ship = self.ship.as_ref()?;
        let star = self.star?;

        if self.claimed_generation == Some(star.generation) {
            return None;
        }

        let touching = overlaps(
            (ship.x, ship.y, SHIP_WIDTH, SHIP_HEIGHT),
            (star.x, star.y, STAR_SIZE, STAR_SIZE),
        );
        if !touching {
            return None;
        }

        self.claimed_generation = Some(star.generation);
        Some(ClientEvent::StarCollected)
    }
}

/// Overlap test for centered `(x, y, width, height)` boxes.
pub fn overlaps(a: (f32, f32, f32, f32), b: (f32, f32, f32, f32)) -> bool {
    let (ax, ay, aw, ah) = a;
    let (bx, by, bw, bh) = b;
    (ax - bx).abs() * 2.0 < aw + bw && (ay - by).abs() * 2.0 < ah + bh
}

fn apply_drag(velocity: f32, amount: f32) -> f32 {
    if velocity.abs() <= amount {
        0.0
    } else {
        velocity - amount * velocity.signum()
    }
}

fn wrap(value: f32, min: f32, max: f32) -> f32 {
    min + (value - min).rem_euclid(max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::CollectibleState;

    const DT: f32 = 1.0 / 60.0;

    fn player(id: SessionId, x: f32, y: f32, team: Team) -> PlayerState {
        PlayerState::new(id, x, y, team)
    }

    fn joined(own: SessionId, players: &[PlayerState]) -> ClientGameState {
        let mut game = ClientGameState::new();
        game.apply_server_event(ServerEvent::Welcome { session_id: own });
        game.apply_server_event(ServerEvent::CurrentPlayers(
            players.iter().map(|p| (p.id, p.clone())).collect(),
        ));
        game
    }

    fn idle() -> ShipInput {
        ShipInput::default()
    }

    #[test]
    fn test_roster_splits_local_and_remote() {
        let game = joined(
            2,
            &[
                player(1, 100.0, 100.0, Team::Red),
                player(2, 200.0, 150.0, Team::Blue),
                player(3, 300.0, 300.0, Team::Red),
            ],
        );

        let ship = game.ship.as_ref().unwrap();
        assert_eq!((ship.x, ship.y), (200.0, 150.0));
        assert_eq!(ship.team, Team::Blue);
        assert_eq!(game.remote_players.len(), 2);
        assert!(!game.remote_players.contains_key(&2));
        assert_eq!(game.remote_players[&3].team, Team::Red);
    }

    #[test]
    fn test_roster_without_session_id_is_all_remote() {
        let mut game = ClientGameState::new();
        game.apply_server_event(ServerEvent::CurrentPlayers(
            [(1, player(1, 0.0, 0.0, Team::Red))].into_iter().collect(),
        ));

        assert!(game.ship.is_none());
        assert_eq!(game.remote_players.len(), 1);
    }

    #[test]
    fn test_new_player_and_movement_snap() {
        let mut game = joined(1, &[player(1, 100.0, 100.0, Team::Red)]);
        game.apply_server_event(ServerEvent::NewPlayer(player(5, 10.0, 10.0, Team::Blue)));

        let mut moved = player(5, 0.0, 0.0, Team::Blue);
        moved.set_pose(Pose::new(10.0, 20.0, 1.0));
        game.apply_server_event(ServerEvent::PlayerMoved(moved));

        let remote = &game.remote_players[&5];
        assert_eq!((remote.x, remote.y, remote.rotation), (10.0, 20.0, 1.0));
    }

    #[test]
    fn test_new_player_about_self_is_ignored() {
        let mut game = joined(1, &[player(1, 100.0, 100.0, Team::Red)]);
        game.apply_server_event(ServerEvent::NewPlayer(player(1, 5.0, 5.0, Team::Red)));
        assert!(game.remote_players.is_empty());
    }

    #[test]
    fn test_unknown_ids_are_tolerated() {
        let mut game = joined(1, &[player(1, 100.0, 100.0, Team::Red)]);
        game.apply_server_event(ServerEvent::PlayerMoved(player(9, 1.0, 1.0, Team::Red)));
        game.apply_server_event(ServerEvent::RemovePlayer(9));

        assert!(game.remote_players.is_empty());
        assert!(game.ship.is_some());
    }

    #[test]
    fn test_remove_player() {
        let mut game = joined(
            1,
            &[player(1, 0.0, 0.0, Team::Red), player(2, 0.0, 0.0, Team::Blue)],
        );
        game.apply_server_event(ServerEvent::RemovePlayer(2));
        assert!(game.remote_players.is_empty());
    }

    #[test]
    fn test_score_update() {
        let mut game = ClientGameState::new();
        game.apply_server_event(ServerEvent::ScoreUpdate(ScoreState { red: 10, blue: 30 }));
        assert_eq!(game.scores, Some(ScoreState { red: 10, blue: 30 }));
    }

    #[test]
    fn test_idle_ship_emits_nothing() {
        let mut game = joined(1, &[player(1, 100.0, 100.0, Team::Red)]);
        for _ in 0..10 {
            assert!(game.update(&idle(), DT).is_empty());
        }
    }

    #[test]
    fn test_no_ship_no_intents() {
        let mut game = ClientGameState::new();
        let input = ShipInput {
            turn: Turn::Left,
            thrust: true,
        };
        assert!(game.update(&input, DT).is_empty());
    }

    #[test]
    fn test_turning_emits_movement_once_per_change() {
        let mut game = joined(1, &[player(1, 100.0, 100.0, Team::Red)]);
        let turn = ShipInput {
            turn: Turn::Right,
            thrust: false,
        };

        let intents = game.update(&turn, DT);
        assert_eq!(intents.len(), 1);
        match intents[0] {
            ClientEvent::PlayerMovement(pose) => {
                assert_eq!((pose.x, pose.y), (100.0, 100.0));
                assert_approx_eq!(pose.rotation, TURN_RATE.to_radians() * DT, 1e-5);
            }
            ref other => panic!("Expected movement, got {:?}", other),
        }

        // Releasing the key leaves the pose unchanged, so nothing more is sent.
        assert!(game.update(&idle(), DT).is_empty());
    }

    #[test]
    fn test_left_turn_is_negative() {
        let mut ship = Ship::new(&player(1, 100.0, 100.0, Team::Red));
        ship.step(
            &ShipInput {
                turn: Turn::Left,
                thrust: false,
            },
            0.1,
        );
        assert_approx_eq!(ship.rotation, -TURN_RATE.to_radians() * 0.1, 1e-5);
    }

    #[test]
    fn test_rotation_wraps_to_pi_range() {
        let mut ship = Ship::new(&player(1, 100.0, 100.0, Team::Red));
        let input = ShipInput {
            turn: Turn::Right,
            thrust: false,
        };
        for _ in 0..200 {
            ship.step(&input, DT);
            assert!(ship.rotation >= -PI && ship.rotation < PI);
        }
    }

    #[test]
    fn test_thrust_moves_ship_forward() {
        let mut ship = Ship::new(&player(1, 400.0, 300.0, Team::Red));
        let input = ShipInput {
            turn: Turn::None,
            thrust: true,
        };
        for _ in 0..30 {
            ship.step(&input, DT);
        }

        // At rotation 0 the nose points up the screen.
        assert!(ship.vel_y < 0.0);
        assert!(ship.y < 300.0);
        assert!(ship.vel_x.abs() < ship.vel_y.abs());
    }

    #[test]
    fn test_velocity_is_capped() {
        let mut ship = Ship::new(&player(1, 400.0, 300.0, Team::Red));
        let input = ShipInput {
            turn: Turn::None,
            thrust: true,
        };
        for _ in 0..600 {
            ship.step(&input, DT);
        }
        assert!(ship.vel_x.abs() <= MAX_VELOCITY);
        assert_approx_eq!(ship.vel_y, -MAX_VELOCITY, 1e-3);
    }

    #[test]
    fn test_drag_brings_ship_to_rest() {
        let mut ship = Ship::new(&player(1, 400.0, 300.0, Team::Red));
        ship.vel_x = 50.0;
        ship.vel_y = -30.0;

        ship.step(&idle(), 0.1);
        assert_approx_eq!(ship.vel_x, 40.0, 1e-4);
        assert_approx_eq!(ship.vel_y, -20.0, 1e-4);

        for _ in 0..10 {
            ship.step(&idle(), 0.1);
        }
        assert_eq!(ship.vel_x, 0.0);
        assert_eq!(ship.vel_y, 0.0);
    }

    #[test]
    fn test_position_wraps_across_bounds() {
        let mut ship = Ship::new(&player(1, WORLD_WIDTH + WRAP_PADDING - 1.0, 300.0, Team::Red));
        ship.vel_x = 120.0;
        ship.step(&idle(), 0.1);
        assert!(ship.x < 20.0);

        let mut ship = Ship::new(&player(1, 300.0, -WRAP_PADDING + 1.0, Team::Red));
        ship.vel_y = -120.0;
        ship.step(&idle(), 0.1);
        assert!(ship.y > WORLD_HEIGHT - 20.0);
    }

    #[test]
    fn test_wrap_helper() {
        assert_approx_eq!(wrap(810.0, -5.0, 805.0), 0.0, 1e-4);
        assert_approx_eq!(wrap(-6.0, -5.0, 805.0), 804.0, 1e-4);
        assert_approx_eq!(wrap(400.0, -5.0, 805.0), 400.0, 1e-4);
    }

    #[test]
    fn test_overlaps() {
        assert!(overlaps((100.0, 100.0, 53.0, 40.0), (120.0, 110.0, 30.0, 30.0)));
        assert!(!overlaps((100.0, 100.0, 53.0, 40.0), (142.0, 100.0, 30.0, 30.0)));
        assert!(!overlaps((100.0, 100.0, 53.0, 40.0), (100.0, 136.0, 30.0, 30.0)));
    }

    #[test]
    fn test_star_claimed_once_per_location() {
        let mut game = joined(1, &[player(1, 200.0, 200.0, Team::Red)]);
        game.apply_server_event(ServerEvent::StarLocation(CollectibleState { x: 205.0, y: 200.0 }));

        assert_eq!(game.update(&idle(), DT), vec![ClientEvent::StarCollected]);
        for _ in 0..5 {
            assert!(game.update(&idle(), DT).is_empty());
        }

        // Relocated onto the same spot: a new star, so a new claim.
        game.apply_server_event(ServerEvent::StarLocation(CollectibleState { x: 205.0, y: 200.0 }));
        assert_eq!(game.update(&idle(), DT), vec![ClientEvent::StarCollected]);
    }

    #[test]
    fn test_distant_star_is_not_claimed() {
        let mut game = joined(1, &[player(1, 200.0, 200.0, Team::Red)]);
        game.apply_server_event(ServerEvent::StarLocation(CollectibleState { x: 600.0, y: 500.0 }));
        assert!(game.update(&idle(), DT).is_empty());
        assert_eq!(game.star.unwrap().generation, 1);
    }

    #[test]
    fn test_star_location_replaces_previous() {
        let mut game = ClientGameState::new();
        game.apply_server_event(ServerEvent::StarLocation(CollectibleState { x: 1.0, y: 2.0 }));
        game.apply_server_event(ServerEvent::StarLocation(CollectibleState { x: 3.0, y: 4.0 }));

        let star = game.star.unwrap();
        assert_eq!((star.x, star.y), (3.0, 4.0));
        assert_eq!(star.generation, 2);
    }
}
