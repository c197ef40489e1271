//! Per-connection dispatch session.
//!
//! A session is one tokio task running a strictly serial loop: read a
//! request, answer it, read the next one. Reads and writes never overlap;
//! the only traffic outside the alternation is ping/pong, answered inline
//! from the read position.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, header};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message, WebSocketConfig};
use tokio_tungstenite::{WebSocketStream, accept_hdr_async_with_config, tungstenite};
use tracing::{debug, info, warn};

use workhive_protocol::constants::{WS_MAX_MESSAGE_SIZE, server_agent};
use workhive_protocol::{CodecError, CommandContainer, PayloadCommand, WireFrame, decode, encode};

use crate::controller::SessionContext;

/// Reasons a session ends abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// Upper bound on the WebSocket handshake; a peer that connects and then
/// goes silent must not pin the session task.
const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Runs one session to completion. Never propagates errors to the acceptor;
/// a failed session is logged and signed off.
pub(crate) async fn run_session(stream: TcpStream, peer_addr: SocketAddr, ctx: SessionContext) {
    let shutdown_token = ctx.shutdown_token();
    let handshake = tokio::select! {
        _ = shutdown_token.cancelled() => {
            debug!(%peer_addr, "server stopped during handshake");
            return;
        }
        result = tokio::time::timeout(HANDSHAKE_TIMEOUT, accept_session(stream)) => result,
    };
    let ws = match handshake {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => {
            warn!(%peer_addr, "handshake failed: {e}");
            return;
        }
        Err(_) => {
            warn!(%peer_addr, "handshake timed out");
            return;
        }
    };

    ctx.sign_on(true);
    match serve(ws, &ctx).await {
        Ok(()) => info!(%peer_addr, "session closed"),
        Err(e) => warn!(%peer_addr, "session closed with error: {e}"),
    }
    ctx.sign_on(false);
}

/// Performs the WebSocket handshake, advertising the session in the
/// `Server` header.
async fn accept_session(
    stream: TcpStream,
) -> Result<WebSocketStream<TcpStream>, tungstenite::Error> {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);

    accept_hdr_async_with_config(
        stream,
        |_req: &Request, mut resp: Response| {
            if let Ok(value) = HeaderValue::from_str(&server_agent()) {
                resp.headers_mut().insert(header::SERVER, value);
            }
            Ok(resp)
        },
        Some(config),
    )
    .await
}

async fn serve(
    mut ws: WebSocketStream<TcpStream>,
    ctx: &SessionContext,
) -> Result<(), SessionError> {
    let shutdown = ctx.shutdown_token();

    loop {
        // Reading. Shutdown interrupts only here, between exchanges, so the
        // request/response alternation is never cut mid-flight.
        let message = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("server stopped while awaiting a request, closing");
                let _ = ws.close(None).await;
                return Ok(());
            }
            message = ws.next() => match message {
                Some(message) => message?,
                None => return Ok(()),
            },
        };

        let frame = match message {
            Message::Text(text) => WireFrame::Text(text.into()),
            Message::Binary(data) => WireFrame::Binary(data.into()),
            Message::Ping(data) => {
                ws.send(Message::Pong(data)).await?;
                continue;
            }
            Message::Pong(_) => continue,
            Message::Close(_) => {
                debug!("received close frame");
                return Ok(());
            }
            Message::Frame(_) => continue,
        };

        // Processing.
        let request = match decode(frame) {
            Ok(request) => request,
            Err(e) => {
                close_with_protocol_error(&mut ws).await;
                return Err(e.into());
            }
        };
        let response = match handle_request(request, ctx) {
            Ok(response) => response,
            Err(e) => {
                close_with_protocol_error(&mut ws).await;
                return Err(e);
            }
        };

        // Writing.
        ws.send(into_message(encode(&response)?)).await?;

        if ctx.server_stopped() {
            debug!("server stopped, draining session");
            let _ = ws.close(None).await;
            return Ok(());
        }
    }
}

/// Maps one client request to the response the session writes back.
fn handle_request(
    request: CommandContainer,
    ctx: &SessionContext,
) -> Result<CommandContainer, SessionError> {
    match request.command() {
        PayloadCommand::GetData | PayloadCommand::Error => Ok(next_work_response(ctx)),
        PayloadCommand::Result => {
            if !request.is_processed() {
                return Err(SessionError::Protocol(
                    "returned payload is not processed".into(),
                ));
            }
            Ok(next_work_response(ctx))
        }
        other => Err(SessionError::Protocol(format!(
            "unexpected command {other} from client"
        ))),
    }
}

fn next_work_response(ctx: &SessionContext) -> CommandContainer {
    match ctx.next_payload() {
        Some(payload) => CommandContainer::compute(payload),
        None => CommandContainer::no_data(),
    }
}

fn into_message(frame: WireFrame) -> Message {
    match frame {
        WireFrame::Text(text) => Message::Text(text.into()),
        WireFrame::Binary(data) => Message::Binary(data.into()),
    }
}

async fn close_with_protocol_error(ws: &mut WebSocketStream<TcpStream>) {
    let _ = ws
        .close(Some(CloseFrame {
            code: CloseCode::Protocol,
            reason: "protocol violation".into(),
        }))
        .await;
}
