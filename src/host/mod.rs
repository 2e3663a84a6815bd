//! Native messaging host: the extension launches this process and talks to
//! it over stdin/stdout.

pub mod bridge;
pub mod framing;
pub mod protocol;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};

use crate::{
    db::KeyValueStore,
    monitor::{MonitorController, MonitorHandle, MonitorPorts},
    settings::MonitorSettings,
    utils::SystemClock,
};

use bridge::{BridgeReply, NativeBridge};
use framing::{read_frame, write_frame};
use protocol::{InboundMessage, OutboundMessage};

const OUTBOUND_QUEUE_DEPTH: usize = 64;
const CONTROL_QUEUE_DEPTH: usize = 64;

/// Serves one extension connection until the extension closes `reader`.
pub async fn serve<R, W>(
    settings: MonitorSettings,
    store: Arc<dyn KeyValueStore>,
    reader: R,
    writer: W,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
    let writer_task = tokio::spawn(pump_outbound(writer, outbound_rx));

    let bridge = Arc::new(NativeBridge::new(outbound_tx.clone()));

    // Replies must flow before the controller starts: its init resolves the
    // desk surface through the bridge.
    let (control_tx, mut control_rx) = mpsc::channel(CONTROL_QUEUE_DEPTH);
    let reader_task = tokio::spawn(pump_inbound(reader, bridge.clone(), control_tx));

    let controller = MonitorController::start(
        settings,
        MonitorPorts {
            registry: bridge.clone(),
            inspector: bridge,
            store,
            clock: Arc::new(SystemClock),
        },
    )
    .await;
    let handle = controller.handle();

    while let Some(message) = control_rx.recv().await {
        route_control(message, &handle, &outbound_tx).await;
    }

    controller.stop().await?;
    drop(outbound_tx);
    if let Err(err) = writer_task.await {
        error!("Native messaging writer failed to join: {err}");
    }

    reader_task.await.context("native messaging reader panicked")?
}

async fn route_control(
    message: InboundMessage,
    handle: &MonitorHandle,
    outbound: &mpsc::Sender<OutboundMessage>,
) {
    match message {
        InboundMessage::Request { id, payload } => {
            let handle = handle.clone();
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let payload = handle.handle_message(&payload).await;
                if outbound
                    .send(OutboundMessage::Response { id, payload })
                    .await
                    .is_err()
                {
                    warn!("Dropped response {id}: writer is gone");
                }
            });
        }
        InboundMessage::SurfaceRemoved { surface_id } => handle.surface_removed(surface_id).await,
        InboundMessage::SurfaceUpdated { surface_id, status } => {
            if status.as_deref() == Some("complete") {
                handle.surface_reloaded(surface_id).await;
            }
        }
        InboundMessage::Surfaces { id, .. } | InboundMessage::InspectResult { id, .. } => {
            warn!("Reply {id} reached the control queue");
        }
    }
}

async fn pump_inbound<R>(
    mut reader: R,
    bridge: Arc<NativeBridge>,
    control: mpsc::Sender<InboundMessage>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(frame) = read_frame(&mut reader).await? {
        let message: InboundMessage = match serde_json::from_value(frame) {
            Ok(message) => message,
            Err(err) => {
                warn!("Ignoring unrecognised message from the extension: {err}");
                continue;
            }
        };

        match message {
            InboundMessage::Surfaces { id, surface_ids } => {
                bridge.resolve(id, BridgeReply::Surfaces(surface_ids));
            }
            InboundMessage::InspectResult {
                id,
                ok,
                data,
                error,
            } => {
                let result = if ok {
                    Ok(data)
                } else {
                    Err(error.unwrap_or_else(|| "unknown script error".into()))
                };
                bridge.resolve(id, BridgeReply::Inspection(result));
            }
            other => {
                if control.send(other).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("Extension closed the native messaging channel");
    Ok(())
}

async fn pump_outbound<W>(mut writer: W, mut outbound: mpsc::Receiver<OutboundMessage>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outbound.recv().await {
        let value = match serde_json::to_value(&message) {
            Ok(value) => value,
            Err(err) => {
                error!("Failed to encode outbound message: {err}");
                continue;
            }
        };

        if let Err(err) = write_frame(&mut writer, &value).await {
            error!("Failed to write to the extension: {err:#}");
            break;
        }
    }
}
