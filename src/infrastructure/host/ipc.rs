//! Local-socket host transport
//!
//! Every client speaks newline-delimited JSON envelopes:
//!
//! ```text
//! client -> bridge : {"topic":"cmd_vel","msg":{"linear":{..},"angular":{..}}}
//! bridge -> client : {"topic":"pose","msg":{"header":{..},"pose":{..}}}
//! ```
//!
//! Commands from any client feed the same subscription. Poses fan out to
//! all connected clients; a client that falls behind skips poses.

use crate::domain::models::{PoseStamped, Twist};
use crate::domain::settings::Settings;
use crate::infrastructure::host::{HostError, HostMiddleware};
use async_trait::async_trait;
use interprocess::local_socket::tokio::{prelude::*, Listener, RecvHalf, SendHalf};
use interprocess::local_socket::{
    GenericFilePath, GenericNamespaced, ListenerOptions, Name, ToFsName, ToNsName,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub topic: String,
    pub msg: T,
}

#[derive(Debug, Clone)]
pub struct IpcHostConfig {
    /// Absolute paths are used as filesystem sockets, anything else as a namespaced name
    pub socket_name: String,
    pub command_topic: String,
    pub pose_topic: String,
    pub queue_depth: usize,
}

impl From<&Settings> for IpcHostConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            socket_name: settings.host_socket_name.clone(),
            command_topic: settings.command_topic.clone(),
            pose_topic: settings.pose_topic.clone(),
            queue_depth: settings.pose_queue_depth,
        }
    }
}

pub(crate) fn socket_name(name: &str) -> std::io::Result<Name<'_>> {
    if name.starts_with('/') {
        name.to_fs_name::<GenericFilePath>()
    } else {
        name.to_ns_name::<GenericNamespaced>()
    }
}

pub struct IpcHost {
    commands_rx: mpsc::UnboundedReceiver<Twist>,
    poses_tx: broadcast::Sender<Arc<String>>,
    pose_topic: String,
    accept_task: JoinHandle<()>,
}

impl IpcHost {
    /// Start listening. Must be called from within a tokio runtime.
    pub fn bind(config: IpcHostConfig) -> Result<Self, HostError> {
        let name = socket_name(&config.socket_name)?;
        let listener = ListenerOptions::new().name(name).create_tokio()?;
        info!("Host socket listening on {}", config.socket_name);

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (poses_tx, _) = broadcast::channel(config.queue_depth);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            commands_tx,
            poses_tx.clone(),
            Arc::from(config.command_topic.as_str()),
        ));

        Ok(Self {
            commands_rx,
            poses_tx,
            pose_topic: config.pose_topic,
            accept_task,
        })
    }
}

impl Drop for IpcHost {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl HostMiddleware for IpcHost {
    async fn next_command(&mut self) -> Option<Twist> {
        self.commands_rx.recv().await
    }

    fn publish_pose(&mut self, pose: &PoseStamped) -> Result<(), HostError> {
        let envelope = Envelope {
            topic: self.pose_topic.clone(),
            msg: pose,
        };
        let line = serde_json::to_string(&envelope)? + "\n";
        if self.poses_tx.send(Arc::new(line)).is_err() {
            trace!("No host clients connected, pose dropped");
        }
        Ok(())
    }
}

async fn accept_loop(
    listener: Listener,
    commands_tx: mpsc::UnboundedSender<Twist>,
    poses_tx: broadcast::Sender<Arc<String>>,
    command_topic: Arc<str>,
) {
    loop {
        match listener.accept().await {
            Ok(stream) => {
                info!("Host client connected");
                let (recv, send) = stream.split();
                tokio::spawn(handle_client(
                    recv,
                    send,
                    commands_tx.clone(),
                    poses_tx.subscribe(),
                    command_topic.clone(),
                ));
            }
            Err(e) => error!("Host accept error: {}", e),
        }
    }
}

async fn handle_client(
    recv: RecvHalf,
    mut send: SendHalf,
    commands_tx: mpsc::UnboundedSender<Twist>,
    mut poses_rx: broadcast::Receiver<Arc<String>>,
    command_topic: Arc<str>,
) {
    let mut lines = BufReader::new(recv).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line, &command_topic) {
                    Ok(Some(twist)) => {
                        if commands_tx.send(twist).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Host read error: {}", e);
                    break;
                }
            },
            pose = poses_rx.recv() => match pose {
                Ok(line) => {
                    if let Err(e) = send.write_all(line.as_bytes()).await {
                        error!("Host write error: {}", e);
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Host client lagging, skipped {} poses", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    info!("Host client disconnected");
}

/// Parse one inbound line. Messages on other topics yield `Ok(None)`.
fn parse_command(line: &str, command_topic: &str) -> Result<Option<Twist>, HostError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let envelope: Envelope<serde_json::Value> = serde_json::from_str(line)?;
    if envelope.topic != command_topic {
        debug!("Ignoring message on topic {}", envelope.topic);
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(envelope.msg)?))
}
