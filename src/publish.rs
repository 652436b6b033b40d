//! Frame publishers.
//!
//! The session hands every finished `FrameMessage` to a `FramePublisher`;
//! delivery is synchronous from the session's point of view. Two
//! implementations:
//!
//! - `MqttFramePublisher`: JSON frames over MQTT at QoS 1, with a retained
//!   availability topic (`<prefix>/status`, `online`/`offline`) wired as the
//!   connection's last will.
//! - `MemoryPublisher`: collects frames in memory for tests.

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, MqttOptions};
use std::time::Duration;

use crate::config::{CameraSettings, MqttSettings};
use crate::frame::FrameMessage;

const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";

pub trait FramePublisher {
    fn publish(&mut self, message: &FrameMessage) -> Result<()>;
}

// ----------------------------------------------------------------------------
// MQTT publisher
// ----------------------------------------------------------------------------

pub struct MqttFramePublisher {
    client: Client,
    frame_topic: String,
    availability_topic: String,
    connection_handle: Option<std::thread::JoinHandle<()>>,
}

impl MqttFramePublisher {
    /// Connect to the broker and announce availability.
    pub fn connect(settings: &MqttSettings, camera: &CameraSettings) -> Result<Self> {
        let (host, port) = split_broker_addr(&settings.broker_addr)?;

        let mut options = MqttOptions::new(&settings.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));
        options.set_clean_start(true);
        if let Some(user) = &settings.username {
            options.set_credentials(user, settings.password.clone().unwrap_or_default());
        }
        let availability_topic = format!("{}/status", settings.topic_prefix);
        let will = rumqttc::v5::mqttbytes::v5::LastWill::new(
            &availability_topic,
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
            None,
        );
        options.set_last_will(will);

        let (client, connection) = Client::new(options, 10);
        let connection_handle = Some(spawn_drain_thread(connection));
        log::info!(
            "connected to MQTT broker {} (auth: {})",
            settings.broker_addr,
            settings.username.is_some()
        );

        client
            .publish(
                &availability_topic,
                QoS::AtLeastOnce,
                true,
                PAYLOAD_ONLINE.as_bytes().to_vec(),
            )
            .context("publish availability")?;

        Ok(MqttFramePublisher {
            client,
            frame_topic: settings.frame_topic(camera),
            availability_topic,
            connection_handle,
        })
    }

    /// Announce offline and tear the connection down.
    pub fn disconnect(mut self) -> Result<()> {
        self.client
            .publish(
                &self.availability_topic,
                QoS::AtLeastOnce,
                true,
                PAYLOAD_OFFLINE.as_bytes().to_vec(),
            )
            .context("publish availability")?;
        self.client.disconnect()?;
        if let Some(handle) = self.connection_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl FramePublisher for MqttFramePublisher {
    fn publish(&mut self, message: &FrameMessage) -> Result<()> {
        let payload = serde_json::to_vec(message).context("serialize frame message")?;
        self.client
            .publish(&self.frame_topic, QoS::AtLeastOnce, false, payload)
            .with_context(|| format!("publish frame to {}", self.frame_topic))?;
        Ok(())
    }
}

fn spawn_drain_thread(mut connection: Connection) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    log::warn!("MQTT connection error: {}", e);
                    break;
                }
            }
        }
    })
}

fn split_broker_addr(addr: &str) -> Result<(&str, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("MQTT broker address must be host:port, got '{}'", addr))?;
    let port: u16 = port
        .parse()
        .map_err(|_| anyhow!("invalid MQTT broker port in '{}'", addr))?;
    Ok((host, port))
}

// ----------------------------------------------------------------------------
// In-memory publisher for tests
// ----------------------------------------------------------------------------

/// Collects published frames instead of delivering them anywhere.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    frames: Vec<FrameMessage>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        MemoryPublisher::default()
    }

    pub fn frames(&self) -> &[FrameMessage] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<FrameMessage> {
        self.frames
    }
}

impl FramePublisher for MemoryPublisher {
    fn publish(&mut self, message: &FrameMessage) -> Result<()> {
        self.frames.push(message.clone());
        Ok(())
    }
}
