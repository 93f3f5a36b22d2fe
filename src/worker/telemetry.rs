//! Receive-only telemetry stream from the worker.
//!
//! One persistent WebSocket per session, decoupled from any control-plane
//! request. The channel never reconnects on its own: a drop is reported as
//! `Closed` and the operation's terminal response still finalizes state.

use crate::model::TelemetryEvent;
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Url;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// What the orchestration layer sees from the channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    Event(TelemetryEvent),
    /// The connection dropped or the worker closed it.
    Closed,
}

struct OpenHandle {
    reader: tokio::task::JoinHandle<()>,
}

/// Owns the connection handle. No other component writes to it.
#[derive(Default)]
pub struct TelemetryChannel {
    current: Option<OpenHandle>,
}

impl TelemetryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect and start forwarding frames into `tx`. Any previously open
    /// connection is torn down first, so at most one reader exists at a time.
    ///
    /// The client sends nothing on this channel; malformed frames are dropped
    /// without terminating the stream.
    pub async fn open(&mut self, url: &Url, tx: UnboundedSender<ChannelEvent>) -> Result<()> {
        self.close();

        let (mut ws, _) = connect_async(url.as_str())
            .await
            .context("connect telemetry channel")?;

        let reader = tokio::spawn(async move {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(event) = serde_json::from_str::<TelemetryEvent>(&text) else {
                            continue;
                        };
                        if tx.send(ChannelEvent::Event(event)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            let _ = tx.send(ChannelEvent::Closed);
        });

        self.current = Some(OpenHandle { reader });
        Ok(())
    }

    /// Idempotent teardown.
    pub fn close(&mut self) {
        if let Some(handle) = self.current.take() {
            // Dropping a JoinHandle does not cancel the task; abort explicitly.
            handle.reader.abort();
        }
    }
}

impl Drop for TelemetryChannel {
    fn drop(&mut self) {
        self.close();
    }
}
