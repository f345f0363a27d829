use crate::game::{ClientGameState, Star, SHIP_HEIGHT, SHIP_WIDTH, STAR_SIZE};
use crate::network::ConnectionStatus;
use macroquad::prelude::*;
use shared::{ScoreState, Team};

const SCORE_FONT_SIZE: f32 = 32.0;

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: f32, height: f32) -> Self {
        Renderer { width, height }
    }

    pub fn render(&mut self, game: &ClientGameState, status: &ConnectionStatus) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        if let Some(star) = &game.star {
            self.draw_star(star);
        }

        for remote in game.remote_players.values() {
            self.draw_ship(remote.x, remote.y, remote.rotation, remote.team, false);
        }

        if let Some(ship) = &game.ship {
            self.draw_ship(ship.x, ship.y, ship.rotation, ship.team, true);
        }

        self.draw_scores(game.scores.unwrap_or_default());
        self.draw_status(status, game.remote_players.len());
    }

    /// Draws a ship as a triangle whose nose points along `rotation`.
    fn draw_ship(&mut self, x: f32, y: f32, rotation: f32, team: Team, is_local: bool) {
        let (sin, cos) = rotation.sin_cos();
        let corner = |dx: f32, dy: f32| vec2(x + dx * cos - dy * sin, y + dx * sin + dy * cos);

        let nose = corner(0.0, -SHIP_HEIGHT / 2.0);
        let left = corner(-SHIP_WIDTH / 2.0, SHIP_HEIGHT / 2.0);
        let right = corner(SHIP_WIDTH / 2.0, SHIP_HEIGHT / 2.0);

        draw_triangle(nose, left, right, Color::from_hex(team.tint()));
        if is_local {
            draw_triangle_lines(nose, left, right, 2.0, WHITE);
        }
    }

    fn draw_star(&mut self, star: &Star) {
        draw_poly(star.x, star.y, 5, STAR_SIZE / 2.0, -90.0, GOLD);
        draw_poly_lines(star.x, star.y, 5, STAR_SIZE / 2.0, -90.0, 1.0, YELLOW);
    }

    fn draw_scores(&mut self, scores: ScoreState) {
        draw_text(
            &format!("Blue: {}", scores.blue),
            16.0,
            16.0 + SCORE_FONT_SIZE,
            SCORE_FONT_SIZE,
            Color::from_hex(Team::Blue.tint()),
        );

        let red_text = format!("Red: {}", scores.red);
        let size = measure_text(&red_text, None, SCORE_FONT_SIZE as u16, 1.0);
        draw_text(
            &red_text,
            self.width - size.width - 16.0,
            16.0 + SCORE_FONT_SIZE,
            SCORE_FONT_SIZE,
            Color::from_hex(Team::Red.tint()),
        );
    }

    fn draw_status(&mut self, status: &ConnectionStatus, remote_count: usize) {
        let (text, color) = match status {
            ConnectionStatus::Connecting => ("Connecting...".to_string(), YELLOW),
            ConnectionStatus::Connected => (format!("Other players: {}", remote_count), GRAY),
            ConnectionStatus::Disconnected(reason) => (format!("Disconnected: {}", reason), RED),
        };
        draw_text(&text, 16.0, self.height - 16.0, 16.0, color);
    }
}
