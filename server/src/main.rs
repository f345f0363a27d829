use clap::Parser;
use log::{error, info};
use server::game::GameState;
use server::network::Server;
use server::ServerResult;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3000")]
    port: u16,

    /// Maximum number of concurrent sessions
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Seed for spawn points, teams and star placement
    #[arg(short, long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> ServerResult<()> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let game_state = match args.seed {
        Some(seed) => {
            info!("Using RNG seed {}", seed);
            GameState::with_seed(seed)
        }
        None => GameState::new(),
    };

    let server = Server::new(&address, args.max_clients)
        .await?
        .with_game_state(game_state);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
