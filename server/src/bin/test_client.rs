use clap::Parser;
use shared::codec::{decode, read_frame, write_frame};
use shared::{ClientEvent, Pose, ServerEvent};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Headless client that walks a circle, optionally claims the star, and prints what it hears.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Number of movement intents to send
    #[arg(short, long, default_value = "10")]
    moves: u32,

    /// Claim the star once after moving
    #[arg(short, long)]
    collect: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let mut stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;

    let payload = read_frame(&mut stream)
        .await?
        .ok_or("server closed the connection before welcoming us")?;
    let session_id = match decode::<ServerEvent>(&payload)? {
        ServerEvent::Welcome { session_id } => session_id,
        other => {
            println!("Expected Welcome but got: {:?}", other);
            return Ok(());
        }
    };
    println!("Connected as session {}", session_id);

    let (mut reader, mut writer) = stream.into_split();
    let printer = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok(Some(payload)) => match decode::<ServerEvent>(&payload) {
                    Ok(event) => println!("Received: {:?}", event),
                    Err(e) => println!("Failed to decode server event: {}", e),
                },
                Ok(None) => {
                    println!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    println!("Error receiving frame: {}", e);
                    break;
                }
            }
        }
    });

    for i in 0..args.moves {
        let angle = i as f32 / 5.0;
        let pose = Pose::new(400.0 + 100.0 * angle.cos(), 300.0 + 100.0 * angle.sin(), angle);

        println!("Sending movement: {:?}", pose);
        write_frame(&mut writer, &ClientEvent::PlayerMovement(pose)).await?;
        sleep(Duration::from_millis(250)).await;
    }

    if args.collect {
        println!("Claiming the star");
        write_frame(&mut writer, &ClientEvent::StarCollected).await?;
    }

    // Give the server a moment to answer before hanging up.
    sleep(Duration::from_millis(500)).await;
    drop(writer);
    printer.abort();

    println!("Test client finished");
    Ok(())
}
