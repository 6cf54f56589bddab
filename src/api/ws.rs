// =============================================================================
// WebSocket Handler — push the chart whenever a new bundle is published
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. The latest bundle immediately on connect (if one exists).
//   2. A fresh bundle whenever `state_version` changes (polled every 500 ms).
//
// Ping frames are answered with Pong; any other inbound traffic is ignored.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::app_state::AppState;

const PUSH_POLL_MS: u64 = 500;

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut last_sent_pass: Option<u64> = None;
    let mut last_seen_version = state.current_state_version();

    if let Err(e) = send_latest(&mut sender, &state, &mut last_sent_pass).await {
        warn!(error = %e, "Failed to send initial chart bundle");
        return;
    }

    let mut push_interval = interval(Duration::from_millis(PUSH_POLL_MS));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let version = state.current_state_version();
                if version == last_seen_version {
                    continue;
                }
                last_seen_version = version;
                if let Err(e) = send_latest(&mut sender, &state, &mut last_sent_pass).await {
                    debug!(error = %e, "WebSocket send failed — disconnecting");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "Failed to send Pong — disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received — disconnecting");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error — disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

/// Send the latest bundle unless the client already has that pass.
/// A version bump caused only by a failed pass sends nothing.
async fn send_latest<S>(
    sender: &mut S,
    state: &Arc<AppState>,
    last_sent_pass: &mut Option<u64>,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let Some(bundle) = state.latest_bundle() else {
        return Ok(());
    };
    if *last_sent_pass == Some(bundle.pass) {
        return Ok(());
    }

    match serde_json::to_string(bundle.as_ref()) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            *last_sent_pass = Some(bundle.pass);
            debug!(pass = bundle.pass, "WebSocket chart bundle sent");
            Ok(())
        }
        Err(e) => {
            // Serialisation errors are not network errors; don't disconnect.
            warn!(error = %e, "Failed to serialize chart bundle");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::router;
    use crate::indicators::BandPair;
    use crate::market_data::FeedError;
    use crate::refresh::{ChartBundle, RefreshError, Renderer};
    use serde_json::Value;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn bundle(pass: u64) -> ChartBundle {
        ChartBundle::assemble("USD/JPY", pass, 25, &[], vec![], BandPair::default(), vec![])
    }

    /// Serve the full router on a random port and open one client socket.
    async fn connect(state: Arc<AppState>) -> Client {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });

        let (ws, _response) = connect_async(format!("ws://{addr}/api/v1/ws"))
            .await
            .expect("Failed to connect");
        ws
    }

    /// Wait for the next text frame and decode it as a bundle.
    async fn next_bundle(ws: &mut Client) -> Value {
        loop {
            let msg = timeout(Duration::from_secs(3), ws.next())
                .await
                .expect("no frame within 3s")
                .expect("socket closed")
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    /// Assert no text frame arrives for a few push polls.
    async fn expect_silence(ws: &mut Client) {
        let quiet = Duration::from_millis(PUSH_POLL_MS * 3);
        let result = timeout(quiet, async {
            loop {
                match ws.next().await {
                    Some(Ok(WsMessage::Text(text))) => return text,
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected socket event: {other:?}"),
                }
            }
        })
        .await;
        assert!(result.is_err(), "unexpected frame: {:?}", result.ok());
    }

    #[tokio::test]
    async fn latest_bundle_is_sent_on_connect() {
        let state = Arc::new(AppState::new());
        state.render(bundle(1));

        let mut ws = connect(state).await;
        let frame = next_bundle(&mut ws).await;
        assert_eq!(frame["pass"], 1);
        assert_eq!(frame["title"], "USD/JPY");
    }

    #[tokio::test]
    async fn nothing_is_sent_before_first_render() {
        let state = Arc::new(AppState::new());
        let mut ws = connect(state.clone()).await;
        expect_silence(&mut ws).await;

        state.render(bundle(1));
        assert_eq!(next_bundle(&mut ws).await["pass"], 1);
    }

    #[tokio::test]
    async fn new_render_is_pushed() {
        let state = Arc::new(AppState::new());
        state.render(bundle(1));

        let mut ws = connect(state.clone()).await;
        assert_eq!(next_bundle(&mut ws).await["pass"], 1);

        state.render(bundle(2));
        assert_eq!(next_bundle(&mut ws).await["pass"], 2);
    }

    #[tokio::test]
    async fn failed_pass_pushes_nothing() {
        let state = Arc::new(AppState::new());
        state.render(bundle(1));

        let mut ws = connect(state.clone()).await;
        assert_eq!(next_bundle(&mut ws).await["pass"], 1);

        let version = state.current_state_version();
        state.pass_failed(2, &RefreshError::Feed(FeedError::Fetch("down".into())));
        assert!(state.current_state_version() > version);
        expect_silence(&mut ws).await;

        state.render(bundle(3));
        assert_eq!(next_bundle(&mut ws).await["pass"], 3);
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let mut ws = connect(Arc::new(AppState::new())).await;
        ws.send(WsMessage::Ping(vec![7, 7, 7])).await.unwrap();

        let reply = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("no reply within 3s")
            .expect("socket closed")
            .unwrap();
        assert_eq!(reply, WsMessage::Pong(vec![7, 7, 7]));
    }
}
