// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serilink frame simulator.
//!
//! Writes encoded mock sensor frames to a serial device (or any writable
//! path) at a fixed interval, standing in for real hardware during
//! end-to-end testing. Pair it with `serilink-publisher` across a pty,
//! e.g. one created by `socat -d -d pty,raw pty,raw`.

use clap::Parser;
use serilink::config::LogLevel;
use serilink::sim::mock_frame;
use std::io::Write;
use std::thread;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Serilink frame simulator - mock sensor frames onto a serial wire
#[derive(Parser, Debug)]
#[command(name = "serilink-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log verbosity (debug, info, warning, error, critical)
    #[arg(short, long, default_value = "info")]
    logging: String,

    /// Serial device or file to write frames to
    #[arg(short = 'p', long, default_value = "/dev/pts/3")]
    serial_device: String,

    /// Seconds between frames
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Number of frames to write (0 writes until interrupted)
    #[arg(short, long, default_value = "0")]
    count: u64,
}

fn tracing_level(name: &str) -> Level {
    match name.parse::<LogLevel>() {
        Ok(LogLevel::Debug) => Level::DEBUG,
        Ok(LogLevel::Info) => Level::INFO,
        Ok(LogLevel::Warning) => Level::WARN,
        Ok(LogLevel::Error) | Ok(LogLevel::Critical) => Level::ERROR,
        Err(_) => Level::INFO,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing_level(&args.logging))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut device = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .open(&args.serial_device)?;
    info!("Started writing serial data to port: {}", args.serial_device);

    let mut written = 0u64;
    loop {
        let timestamp = chrono::Local::now()
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string();
        let frame = mock_frame(&timestamp);
        info!("{}", frame);

        // Frames are separated on the wire by the space between the
        // terminator tokens and the next frame's first token.
        write!(device, "{} ", frame)?;
        device.flush()?;

        written += 1;
        if args.count > 0 && written >= args.count {
            break;
        }
        thread::sleep(Duration::from_secs(args.interval));
    }

    info!("Wrote {} frames", written);
    Ok(())
}
