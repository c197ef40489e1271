//! The client worker: connect, request work, process, return results.

use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::connect_async_with_config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use workhive_protocol::constants::{
    CLIENT_BACKOFF_MAX_MS, CLIENT_BACKOFF_MIN_MS, WS_MAX_MESSAGE_SIZE, client_agent,
};
use workhive_protocol::{CommandContainer, PayloadCommand, WireFrame, decode, encode};

use crate::pumps::{read_pump, write_pump};
use crate::{ClientConfig, ClientError, ClientReport};

/// Runs the worker until the server closes the conversation.
///
/// Connects, opens with `get_data`, then alternates strictly with the
/// server. Returns once the connection ends: an orderly close (normal after
/// server shutdown) yields `Ok`, anything else the fatal error.
pub async fn run(config: &ClientConfig) -> Result<ClientReport, ClientError> {
    let url = format!("ws://{}:{}/", config.host, config.port);
    let mut request = url.as_str().into_client_request()?;
    if let Ok(value) = HeaderValue::from_str(&client_agent()) {
        request.headers_mut().insert(header::USER_AGENT, value);
    }

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

    let (ws_stream, _response) = connect_async_with_config(request, Some(ws_config), false).await?;
    info!(client_id = config.client_id, %url, "connected to dispatch server");

    let (write, read) = ws_stream.split();
    let cancel = CancellationToken::new();
    let (write_tx, write_rx) = mpsc::channel::<Message>(16);
    let (frame_tx, frame_rx) = mpsc::channel::<WireFrame>(16);

    let write_handle = tokio::spawn(write_pump(write, write_rx, cancel.clone()));
    let read_handle = tokio::spawn(read_pump(read, frame_tx, write_tx.clone(), cancel.clone()));

    // Open the conversation; all further requests are answers to responses.
    let opener = send_container(&write_tx, &CommandContainer::get_data()).await;
    let worked = match opener {
        Ok(()) => work_loop(frame_rx, &write_tx, config.client_id).await,
        // A connection that died before the opener: the read pump reports
        // the authoritative reason below.
        Err(ClientError::Ws(_)) => Ok(0),
        Err(e) => Err(e),
    };

    cancel.cancel();
    drop(write_tx);
    let read_result = read_handle.await;
    let _ = write_handle.await;

    let items_processed = worked?;

    // The read pump owns the authoritative view of how the connection ended.
    match read_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Err(ClientError::TaskFailed),
    }

    info!(
        client_id = config.client_id,
        items_processed, "client finished"
    );
    Ok(ClientReport { items_processed })
}

/// Serial processing loop: one response in, one request out.
async fn work_loop(
    mut frame_rx: mpsc::Receiver<WireFrame>,
    write_tx: &mpsc::Sender<Message>,
    client_id: usize,
) -> Result<usize, ClientError> {
    let mut items_processed = 0usize;

    while let Some(frame) = frame_rx.recv().await {
        let response = decode(frame)?;
        match response.command() {
            PayloadCommand::Compute => {
                let Some(payload) = response.into_payload() else {
                    // Unreachable: decoding enforces the pairing invariant.
                    return Err(ClientError::UnexpectedCommand(PayloadCommand::Compute));
                };

                // Sorting and sleeping block; keep them off the reactor.
                let processed = tokio::task::spawn_blocking(move || {
                    let mut payload = payload;
                    payload.process();
                    payload
                })
                .await
                .map_err(|_| ClientError::TaskFailed)?;

                items_processed += 1;
                debug!(client_id, items_processed, "processed a work item");
                if send_container(write_tx, &CommandContainer::result(processed))
                    .await
                    .is_err()
                {
                    break;
                }
            }

            PayloadCommand::NoData | PayloadCommand::Error => {
                // Back off briefly so an idle server is not hammered.
                let backoff =
                    rand::thread_rng().gen_range(CLIENT_BACKOFF_MIN_MS..=CLIENT_BACKOFF_MAX_MS);
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                if send_container(write_tx, &CommandContainer::get_data())
                    .await
                    .is_err()
                {
                    break;
                }
            }

            other => return Err(ClientError::UnexpectedCommand(other)),
        }
    }

    Ok(items_processed)
}

/// Encodes a container and queues it on the write pump.
///
/// A closed channel means the connection is gone; the caller stops and the
/// read pump reports how it ended.
async fn send_container(
    write_tx: &mpsc::Sender<Message>,
    container: &CommandContainer,
) -> Result<(), ClientError> {
    let message = match encode(container)? {
        WireFrame::Text(text) => Message::Text(text.into()),
        WireFrame::Binary(data) => Message::Binary(data.into()),
    };
    if write_tx.send(message).await.is_err() {
        debug!("connection closed while sending, stopping");
        return Err(ClientError::Ws(
            tokio_tungstenite::tungstenite::Error::ConnectionClosed,
        ));
    }
    Ok(())
}
