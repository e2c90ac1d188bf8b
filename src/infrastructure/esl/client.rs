//! Event socket client
//!
//! One TCP connection carries every command and every event. Commands are
//! answered in the order they were sent, so replies are matched to callers
//! through a FIFO of pending one-shot senders. A single writer task owns
//! the socket's write half: it queues a request's sender and writes the
//! whole frame, so a caller that gives up only drops its own receiver.

use super::frame::{encode, parse_event, read_frame, Frame};
use crate::config::SwitchConfig;
use crate::domain::call::Command;
use crate::domain::shared::{FlowError, Result};
use crate::domain::switch::{SwitchClient, SwitchEvent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

type ReplySender = oneshot::Sender<Result<String>>;
type Pending = Arc<Mutex<VecDeque<ReplySender>>>;

const EVENT_CHANNEL_CAPACITY: usize = 1000;
const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// A command waiting for the writer task
struct Request {
    wire: String,
    reply: ReplySender,
}

pub struct EslSwitchClient {
    requests: mpsc::Sender<Request>,
    connected: Arc<AtomicBool>,
}

impl EslSwitchClient {
    /// Connect, authenticate and subscribe to events.
    ///
    /// Returns the client and the stream of decoded switch events.
    pub async fn connect(config: &SwitchConfig) -> Result<(Self, mpsc::Receiver<SwitchEvent>)> {
        let address = config.address();
        info!("Connecting to switch event socket at {}", address);

        let stream = timeout(config.connect_timeout(), TcpStream::connect(&address))
            .await
            .map_err(|_| FlowError::Timeout(format!("connecting to {}", address)))?
            .map_err(|e| FlowError::Transport(format!("failed to connect to {}: {}", address, e)))?;

        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        timeout(
            config.connect_timeout(),
            handshake(&mut reader, &mut write_half, config),
        )
        .await
        .map_err(|_| FlowError::Timeout(format!("event socket handshake with {}", address)))??;

        info!("Authenticated with switch at {}", address);

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let pending: Pending = Arc::new(Mutex::new(VecDeque::new()));
        let connected = Arc::new(AtomicBool::new(true));

        tokio::spawn(read_loop(reader, pending.clone(), events_tx, connected.clone()));
        tokio::spawn(write_loop(write_half, requests_rx, pending, connected.clone()));

        Ok((
            Self {
                requests: requests_tx,
                connected,
            },
            events_rx,
        ))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwitchClient for EslSwitchClient {
    async fn api(&self, command: &Command) -> Result<String> {
        if !self.is_connected() {
            return Err(FlowError::Transport("switch connection is closed".to_string()));
        }

        debug!("ESL >> api {}", command);

        let (tx, rx) = oneshot::channel();
        let request = Request {
            wire: encode(&format!("api {}", command)),
            reply: tx,
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| FlowError::Transport("switch connection is closed".to_string()))?;

        rx.await
            .map_err(|_| FlowError::Transport("switch connection closed before reply".to_string()))?
    }
}

/// Sole writer of the socket.
///
/// The reply sender is queued before the frame is written so a reply can
/// never overtake it. Queueing checks the connection flag under the
/// pending lock, the same lock the reader holds when it fails every
/// pending request.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut requests: mpsc::Receiver<Request>,
    pending: Pending,
    connected: Arc<AtomicBool>,
) {
    while let Some(request) = requests.recv().await {
        if request.reply.is_closed() {
            debug!("Caller gave up before its command was sent, skipping");
            continue;
        }

        {
            let mut queue = lock(&pending);
            if !connected.load(Ordering::SeqCst) {
                let _ = request
                    .reply
                    .send(Err(FlowError::Transport("switch connection is closed".to_string())));
                continue;
            }
            queue.push_back(request.reply);
        }

        if let Err(e) = writer.write_all(request.wire.as_bytes()).await {
            error!("Failed to write to switch: {}", e);
            fail_pending(&pending, &connected, "switch connection lost");
            break;
        }
    }

    debug!("Event socket writer stopped");
}

async fn handshake(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    config: &SwitchConfig,
) -> Result<()> {
    let greeting = expect_frame(reader).await?;
    if greeting.content_type() != Some("auth/request") {
        return Err(FlowError::Transport(format!(
            "unexpected greeting: {:?}",
            greeting.content_type()
        )));
    }

    send_command(reader, writer, &format!("auth {}", config.password))
        .await
        .map_err(|e| FlowError::Transport(format!("authentication rejected: {}", e)))?;

    if !config.subscriptions.trim().is_empty() {
        send_command(reader, writer, &format!("event plain {}", config.subscriptions.trim())).await?;
        debug!("Subscribed to switch events: {}", config.subscriptions);
    }

    Ok(())
}

/// Send a control command and wait for its `command/reply`
async fn send_command(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    command: &str,
) -> Result<()> {
    writer
        .write_all(encode(command).as_bytes())
        .await
        .map_err(|e| FlowError::Transport(format!("write failed: {}", e)))?;

    loop {
        let frame = expect_frame(reader).await?;
        if frame.content_type() != Some("command/reply") {
            continue;
        }

        let reply = frame.reply_text();
        return if reply.starts_with("+OK") {
            Ok(())
        } else {
            Err(FlowError::Transport(reply))
        };
    }
}

async fn expect_frame(reader: &mut BufReader<OwnedReadHalf>) -> Result<Frame> {
    read_frame(reader)
        .await?
        .ok_or_else(|| FlowError::Transport("switch closed the connection".to_string()))
}

async fn read_loop(
    mut reader: BufReader<OwnedReadHalf>,
    pending: Pending,
    events: mpsc::Sender<SwitchEvent>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => match frame.content_type() {
                Some("api/response") | Some("command/reply") => {
                    let reply = frame.reply_text();
                    debug!("ESL << {}", reply.trim_end());
                    match lock(&pending).pop_front() {
                        Some(tx) => {
                            let _ = tx.send(Ok(reply));
                        }
                        None => warn!("Dropping reply with no pending request: {}", reply.trim_end()),
                    }
                }
                Some("text/event-plain") => {
                    let event = parse_event(frame.body().unwrap_or_default());
                    match events.try_send(event) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(event)) => {
                            warn!("Event queue full, dropping {:?}", event.event_name());
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {
                            debug!("Event receiver dropped, discarding switch event");
                        }
                    }
                }
                Some("text/disconnect-notice") => {
                    warn!("Switch sent disconnect notice");
                    break;
                }
                other => debug!("Ignoring frame of type {:?}", other),
            },
            Ok(None) => {
                info!("Switch closed the event socket");
                break;
            }
            Err(e) => {
                error!("Event socket read error: {}", e);
                break;
            }
        }
    }

    fail_pending(&pending, &connected, "switch connection closed");
}

/// Mark the connection closed and fail every request waiting for a reply
fn fail_pending(pending: &Pending, connected: &AtomicBool, reason: &str) {
    let mut queue = lock(pending);
    connected.store(false, Ordering::SeqCst);
    for tx in queue.drain(..) {
        let _ = tx.send(Err(FlowError::Transport(reason.to_string())));
    }
}

fn lock(pending: &Pending) -> std::sync::MutexGuard<'_, VecDeque<ReplySender>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
