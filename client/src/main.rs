use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::{ConnectionStatus, NetworkClient, NetworkEvent};
use client::rendering::Renderer;
use log::info;
use macroquad::prelude::*;
use shared::{WORLD_HEIGHT, WORLD_WIDTH};

/// Longest frame the ship simulation will integrate in one step.
const MAX_FRAME_TIME: f32 = 0.1;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn window_conf() -> Conf {
    Conf {
        window_title: "Star Sync".to_string(),
        window_width: WORLD_WIDTH as i32,
        window_height: WORLD_HEIGHT as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: Left/Right to turn, Up to thrust, Escape to quit");

    let mut status = ConnectionStatus::Connecting;
    let mut network = match NetworkClient::connect(&args.server, args.fake_ping) {
        Ok(network) => Some(network),
        Err(e) => {
            status = ConnectionStatus::Disconnected(e.to_string());
            None
        }
    };

    let mut game = ClientGameState::new();
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new(WORLD_WIDTH, WORLD_HEIGHT);

    loop {
        if input_manager.quit_requested() {
            break;
        }

        if let Some(network) = network.as_mut() {
            for event in network.poll() {
                status.apply(&event);
                if let NetworkEvent::Received(event) = event {
                    game.apply_server_event(event);
                }
            }
        }

        let input = input_manager.update();
        let dt = get_frame_time().min(MAX_FRAME_TIME);
        let intents = game.update(&input, dt);

        if status.is_connected() {
            if let Some(network) = network.as_ref() {
                for intent in intents {
                    network.send(intent);
                }
            }
        }

        renderer.render(&game, &status);
        next_frame().await;
    }

    info!("Client shutting down");
}
