//! Still image server example
//!
//! Serves JPEG files from disk through a `FrameStreamer`, either as an MJPEG
//! stream that cycles through the files or as one still image per request.
//!
//! Run with: cargo run --example still_image_server [--single] FILE.jpg [FILE.jpg ...]
//!
//! Examples:
//!   cargo run --example still_image_server a.jpg b.jpg        # MJPEG stream, alternating images
//!   cargo run --example still_image_server --single a.jpg     # image/jpeg per request
//!
//! Then open http://localhost:8080/ in a browser.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use mjpeg_rs::{FrameProducer, FrameStreamer, ServerConfig, StreamerConfig};

/// Cycles through a fixed list of images, one per second
struct Slideshow {
    images: Vec<Bytes>,
    started: std::time::Instant,
    shown: AtomicUsize,
}

impl FrameProducer for Slideshow {
    fn latest_jpeg(&self) -> Option<Bytes> {
        if self.images.is_empty() {
            return None;
        }
        let index = self.started.elapsed().as_secs() as usize % self.images.len();
        self.shown.store(index, Ordering::Relaxed);
        // Same Bytes handle while the index is unchanged, so it is not re-sent
        Some(self.images[index].clone())
    }
}

fn print_usage() {
    eprintln!("Usage: still_image_server [--single] FILE.jpg [FILE.jpg ...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --single     Serve one image per request instead of a stream");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let single = args.iter().any(|a| a == "--single");
    let mut images = Vec::new();
    for path in args.iter().filter(|a| !a.starts_with("--")) {
        images.push(Bytes::from(std::fs::read(path)?));
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpeg_rs=debug".parse()?)
                .add_directive("still_image_server=debug".parse()?),
        )
        .init();

    let slideshow = Arc::new(Slideshow {
        images,
        started: std::time::Instant::now(),
        shown: AtomicUsize::new(0),
    });

    let config = StreamerConfig::default()
        .server(ServerConfig::with_port(8080).single_frame(single))
        .poll_interval(Duration::from_millis(100));

    let producer = Arc::clone(&slideshow);
    let (mut streamer, mut events) = FrameStreamer::new(config, move || producer.latest_jpeg());

    let port = streamer.start_server().await?;
    println!("Serving on http://localhost:{}/", port);

    loop {
        tokio::select! {
            Some(event) = events.recv() => println!("Streamer: {:?}", event),
            _ = tokio::time::sleep(Duration::from_secs(5)) => {
                let stats = streamer.server_stats();
                println!(
                    "Showing image {}; {} clients, {} images sent",
                    slideshow.shown.load(Ordering::Relaxed),
                    stats.active_connections,
                    stats.frames_sent
                );
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    streamer.stop_server().await?;
    Ok(())
}
