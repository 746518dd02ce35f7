//! MJPEG relay example
//!
//! Pulls an MJPEG stream from a camera and re-serves it locally.
//!
//! Run with: cargo run --example relay SOURCE_URL [PORT]
//!
//! Examples:
//!   cargo run --example relay http://10.2.13.100:8080/video          # serves on an ephemeral port
//!   cargo run --example relay http://admin:pw@camera.local/mjpg 8081 # serves on port 8081
//!
//! ## Watching the relayed stream
//!
//! With a browser:
//!   http://localhost:8081/
//!
//! With ffplay:
//!   ffplay -f mjpeg http://localhost:8081/

use std::time::Duration;

use mjpeg_rs::{ClientConfig, ClientEvent, FrameBuffer, MjpegPuller, MjpegServer, ServerConfig};

fn print_usage() {
    eprintln!("Usage: relay SOURCE_URL [PORT]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  SOURCE_URL   http:// URL of the camera's MJPEG stream");
    eprintln!("  PORT         Port to serve on (default: 0, pick one)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let port = match args.get(2) {
        Some(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("Error: invalid port '{}'", port);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => 0,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?)
                .add_directive("relay=debug".parse()?),
        )
        .init();

    // The buffer is the puller's sink and the server's source
    let buffer = FrameBuffer::new();

    let mut server = MjpegServer::new(ServerConfig::with_port(port), buffer.clone());
    let port = server.start().await?;

    let config = ClientConfig::new(args[1].clone()).reconnect_delay(Duration::from_secs(2));
    let (mut puller, mut events) = MjpegPuller::new(config, buffer);

    println!("Relaying {} on http://localhost:{}/", args[1], port);
    println!();

    puller.start();

    let mut frames: u64 = 0;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::ConnectionSucceeded) => {
                    frames += 1;
                    if frames % 100 == 0 {
                        let stats = server.stats();
                        println!(
                            "Relayed {} frames, {} clients, {} parts sent",
                            frames, stats.active_connections, stats.frames_sent
                        );
                    }
                }
                Some(other) => println!("Source: {:?}", other),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    puller.terminate();
    server.stop().await?;

    Ok(())
}
