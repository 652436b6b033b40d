//! relayd - camera frame relay daemon
//!
//! This daemon:
//! 1. Opens the configured RTSP stream and selects a video stream by index
//! 2. Validates the bitstream framing once, on the first usable packet
//! 3. Reassembles codec frames from transport packets
//! 4. Stamps each frame with a wall-clock timestamp anchored at stream open
//! 5. Publishes codec-tagged frame messages over MQTT
//!
//! Fatal conditions (bad stream index, codec mismatch, malformed bitstream)
//! terminate the process; restart policy belongs to the supervisor.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_relay::{MqttFramePublisher, RelayConfig, RtspConfig, RtspSource, Session};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Relay RTSP camera frames to MQTT as codec-tagged messages"
)]
struct Args {
    /// Path to the JSON config file.
    #[arg(long, env = "CAMERA_RELAY_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let cfg = RelayConfig::load(args.config.as_deref())?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .context("install ctrl-c handler")?;
    }

    log::info!("connecting to {}", cfg.camera.display_url());
    let mut source = RtspSource::new(RtspConfig {
        url: cfg.camera.stream_url(),
        stream_index: cfg.stream_index,
        codec: cfg.codec,
    })?;
    let mut publisher = MqttFramePublisher::connect(&cfg.mqtt, &cfg.camera)?;

    let mut session = Session::new(cfg.codec, cfg.camera.entity_path(), cfg.framing.clone())
        .with_shutdown(shutdown);
    let stats = session.run(&mut source, &mut publisher)?;

    log::info!(
        "relay finished: {} packets in, {} frames published",
        stats.packets_seen,
        stats.frames_published
    );
    publisher.disconnect()?;
    Ok(())
}
