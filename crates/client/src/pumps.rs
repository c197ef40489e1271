//! Read and write pumps for the client connection.
//!
//! The read pump keeps a read outstanding at all times so control frames are
//! handled promptly; data frames are handed to the worker over a channel and
//! the next read starts immediately. All outbound traffic (responses and
//! pongs alike) funnels through the write pump's channel, so at most one
//! write is ever in flight.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use workhive_protocol::WireFrame;

/// Reads frames from the WebSocket and forwards data frames to the worker.
///
/// Returns `Ok` on an orderly end (close frame, stream end, cancellation)
/// and the transport error otherwise.
pub(crate) async fn read_pump<S>(
    mut read: S,
    frame_tx: mpsc::Sender<WireFrame>,
    write_tx: mpsc::Sender<Message>,
    cancel: CancellationToken,
) -> Result<(), tungstenite::Error>
where
    S: StreamExt<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            message = read.next() => message,
        };

        match message {
            Some(Ok(message)) => match message {
                Message::Text(text) => {
                    if frame_tx.send(WireFrame::Text(text.into())).await.is_err() {
                        return Ok(());
                    }
                }
                Message::Binary(data) => {
                    if frame_tx.send(WireFrame::Binary(data.into())).await.is_err() {
                        return Ok(());
                    }
                }
                Message::Ping(data) => {
                    let _ = write_tx.send(Message::Pong(data)).await;
                }
                Message::Pong(_) => {}
                Message::Close(_) => {
                    debug!("received close frame");
                    return Ok(());
                }
                Message::Frame(_) => {}
            },
            Some(Err(e)) => {
                warn!("read error: {e}");
                return Err(e);
            }
            None => {
                debug!("stream ended");
                return Ok(());
            }
        }
    }
}

/// Drains the outbound channel into the WebSocket sink.
pub(crate) async fn write_pump<S>(
    mut write: S,
    mut write_rx: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) where
    S: SinkExt<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            message = write_rx.recv() => match message {
                Some(message) => {
                    if let Err(e) = write.send(message).await {
                        warn!("write error: {e}");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    // Best-effort close frame.
    let _ = write.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use futures_util::{sink, stream};

    use super::*;

    #[tokio::test]
    async fn read_pump_forwards_data_frames() {
        let frames = vec![
            Ok(Message::Text("one".into())),
            Ok(Message::Binary(vec![1, 2, 3].into())),
        ];
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let (write_tx, _write_rx) = mpsc::channel(8);

        read_pump(
            stream::iter(frames),
            frame_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(frame_rx.recv().await, Some(WireFrame::Text("one".into())));
        assert_eq!(
            frame_rx.recv().await,
            Some(WireFrame::Binary(vec![1, 2, 3]))
        );
        assert_eq!(frame_rx.recv().await, None);
    }

    #[tokio::test]
    async fn read_pump_answers_pings_with_pongs() {
        let frames = vec![Ok(Message::Ping(vec![7].into()))];
        let (frame_tx, _frame_rx) = mpsc::channel(8);
        let (write_tx, mut write_rx) = mpsc::channel(8);

        read_pump(
            stream::iter(frames),
            frame_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        match write_rx.recv().await {
            Some(Message::Pong(data)) => assert_eq!(data.to_vec(), vec![7]),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_pump_stops_at_the_close_frame() {
        let frames = vec![
            Ok(Message::Close(None)),
            Ok(Message::Text("after close".into())),
        ];
        let (frame_tx, mut frame_rx) = mpsc::channel(8);
        let (write_tx, _write_rx) = mpsc::channel(8);

        read_pump(
            stream::iter(frames),
            frame_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        // Nothing after the close frame is delivered.
        assert_eq!(frame_rx.recv().await, None);
    }

    #[tokio::test]
    async fn read_pump_surfaces_transport_errors() {
        let frames = vec![Err(tungstenite::Error::ConnectionClosed)];
        let (frame_tx, _frame_rx) = mpsc::channel(8);
        let (write_tx, _write_rx) = mpsc::channel(8);

        let result = read_pump(
            stream::iter(frames),
            frame_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn write_pump_sends_a_close_frame_on_cancel() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<Message>(8);
        let sink = Box::pin(sink::unfold(sink_tx, |tx, message: Message| async move {
            let _ = tx.send(message).await;
            Ok::<_, tungstenite::Error>(tx)
        }));

        let (_write_tx, write_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        write_pump(sink, write_rx, cancel).await;

        assert!(matches!(sink_rx.recv().await, Some(Message::Close(_))));
    }

    #[tokio::test]
    async fn write_pump_drains_the_channel() {
        let (sink_tx, mut sink_rx) = mpsc::channel::<Message>(8);
        let sink = Box::pin(sink::unfold(sink_tx, |tx, message: Message| async move {
            let _ = tx.send(message).await;
            Ok::<_, tungstenite::Error>(tx)
        }));

        let (write_tx, write_rx) = mpsc::channel(8);
        write_tx.send(Message::Text("payload".into())).await.unwrap();
        drop(write_tx);
        write_pump(sink, write_rx, CancellationToken::new()).await;

        match sink_rx.recv().await {
            Some(Message::Text(text)) => assert_eq!(text.to_string(), "payload"),
            other => panic!("expected text, got {other:?}"),
        }
        assert!(matches!(sink_rx.recv().await, Some(Message::Close(_))));
    }
}
