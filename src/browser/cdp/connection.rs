use futures_util::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::protocol::Incoming;
use crate::error_handling::types::{BrowserError, LaunchError};

const EVENT_CAPACITY: usize = 256;

type Reply = Result<Value, BrowserError>;
type PendingCalls = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// A protocol event, tagged with the flattened session it belongs to (if any).
#[derive(Debug, Clone)]
pub struct CdpEvent {
    pub method: String,
    pub session_id: Option<String>,
    pub params: Value,
}

/// Multiplexed DevTools websocket shared by every page of one browser.
///
/// Commands are matched to responses by id. Events are fanned out on a
/// broadcast channel; subscribers filter on `session_id`. When the socket goes
/// away every outstanding call resolves to [`BrowserError::ConnectionClosed`].
pub struct CdpConnection {
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingCalls,
    events: broadcast::Sender<CdpEvent>,
    next_id: AtomicU64,
    io_task: JoinHandle<()>,
}

impl CdpConnection {
    pub async fn connect(url: &str) -> Result<Self, LaunchError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| LaunchError::ConnectionFailed(e.to_string()))?;
        debug!("Connected to DevTools endpoint {}", url);

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let pending: PendingCalls = Arc::default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let io_pending = Arc::clone(&pending);
        let io_events = events.clone();
        let io_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = outbound_rx.recv() => match msg {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                warn!("DevTools send failed: {}", e);
                                break;
                            }
                        }
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    frame = source.next() => match frame {
                        Some(Ok(Message::Text(text))) => dispatch(text.as_str(), &io_pending, &io_events),
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("DevTools receive failed: {}", e);
                            break;
                        }
                    }
                }
            }
            fail_pending(&io_pending);
            debug!("DevTools connection task ended");
        });

        Ok(Self {
            outbound,
            pending,
            events,
            next_id: AtomicU64::new(1),
            io_task,
        })
    }

    /// Sends `method` and waits for its response. `session_id` targets an attached page.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        session_id: Option<&str>,
    ) -> Result<Value, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut message = json!({ "id": id, "method": method, "params": params });
        if let Some(session_id) = session_id {
            message["sessionId"] = json!(session_id);
        }

        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            Ok(mut pending) => {
                pending.insert(id, tx);
            }
            Err(_) => return Err(BrowserError::ConnectionClosed),
        }
        // Dropped on every exit, including a caller giving up mid-await.
        let _waiting = PendingEntry {
            pending: &self.pending,
            id,
        };

        trace!("-> {} #{} {:?}", method, id, session_id);
        if self.outbound.send(message.to_string()).is_err() {
            return Err(BrowserError::ConnectionClosed);
        }

        rx.await.map_err(|_| BrowserError::ConnectionClosed)?
    }

    /// Events received from now on. Subscribe before issuing the command that triggers them.
    pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.io_task.is_finished()
    }

    #[cfg(test)]
    fn pending_calls(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }
}

/// Removes a call's reply slot once its caller stops waiting.
struct PendingEntry<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(&self.id);
        }
    }
}

impl Drop for CdpConnection {
    fn drop(&mut self) {
        self.io_task.abort();
    }
}

fn dispatch(text: &str, pending: &PendingCalls, events: &broadcast::Sender<CdpEvent>) {
    let incoming: Incoming = match serde_json::from_str(text) {
        Ok(incoming) => incoming,
        Err(e) => {
            warn!("Ignoring malformed DevTools message: {}", e);
            return;
        }
    };

    if let Some(id) = incoming.id {
        let waiter = pending.lock().ok().and_then(|mut p| p.remove(&id));
        let Some(waiter) = waiter else {
            trace!("Response #{} has no waiter", id);
            return;
        };
        let reply = match incoming.error {
            Some(e) => Err(BrowserError::Protocol(format!("{} ({})", e.message, e.code))),
            None => Ok(incoming.result.unwrap_or(Value::Null)),
        };
        let _ = waiter.send(reply);
    } else if let Some(method) = incoming.method {
        trace!("<- {} {:?}", method, incoming.session_id);
        // No receivers is fine: nobody is waiting for this event.
        let _ = events.send(CdpEvent {
            method,
            session_id: incoming.session_id,
            params: incoming.params,
        });
    }
}

fn fail_pending(pending: &PendingCalls) {
    if let Ok(mut pending) = pending.lock() {
        for (_, waiter) in pending.drain() {
            let _ = waiter.send(Err(BrowserError::ConnectionClosed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one client and answers every command via `respond`, which returns
    /// the frames to send back (responses and events).
    async fn scripted_endpoint<F>(respond: F) -> String
    where
        F: Fn(&Value) -> Vec<Value> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let (mut sink, mut source) = ws.split();
            while let Some(Ok(msg)) = source.next().await {
                if let Message::Text(text) = msg {
                    let request: Value = serde_json::from_str(text.as_str()).unwrap();
                    for frame in respond(&request) {
                        if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        format!("ws://{}/devtools/browser/test", addr)
    }

    #[tokio::test]
    async fn call_returns_result_and_error() {
        let url = scripted_endpoint(|req| {
            let id = req["id"].clone();
            match req["method"].as_str() {
                Some("Browser.getVersion") => {
                    vec![json!({"id": id, "result": {"product": "HeadlessChrome/1"}})]
                }
                _ => vec![json!({"id": id, "error": {"code": -32601, "message": "not found"}})],
            }
        })
        .await;
        let conn = CdpConnection::connect(&url).await.unwrap();

        let version = conn.call("Browser.getVersion", json!({}), None).await.unwrap();
        assert_eq!(version["product"], "HeadlessChrome/1");

        let err = conn.call("Nope.nothing", json!({}), None).await.unwrap_err();
        match err {
            BrowserError::Protocol(message) => assert!(message.contains("not found")),
            other => panic!("expected protocol error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn events_carry_session_id() {
        let url = scripted_endpoint(|req| {
            vec![
                json!({
                    "method": "Page.lifecycleEvent",
                    "sessionId": req["sessionId"],
                    "params": {"name": "load"}
                }),
                json!({"id": req["id"], "result": {}}),
            ]
        })
        .await;
        let conn = CdpConnection::connect(&url).await.unwrap();
        let mut events = conn.subscribe();

        conn.call("Page.enable", json!({}), Some("S1")).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.method, "Page.lifecycleEvent");
        assert_eq!(event.session_id.as_deref(), Some("S1"));
        assert_eq!(event.params["name"], "load");
    }

    #[tokio::test]
    async fn pending_calls_fail_when_socket_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // Read the command, then hang up without answering.
            let _ = ws.next().await;
            let _ = ws.close(None).await;
        });
        let conn = CdpConnection::connect(&format!("ws://{}/", addr))
            .await
            .unwrap();

        let err = conn.call("Browser.close", json!({}), None).await.unwrap_err();
        assert!(matches!(err, BrowserError::ConnectionClosed));
    }

    #[tokio::test]
    async fn abandoned_call_releases_its_reply_slot() {
        let url = scripted_endpoint(|req| match req["method"].as_str() {
            Some("Page.navigate") => vec![],
            _ => vec![json!({"id": req["id"], "result": {}})],
        })
        .await;
        let conn = CdpConnection::connect(&url).await.unwrap();

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            conn.call("Page.navigate", json!({"url": "http://render.test"}), Some("S1")),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(conn.pending_calls(), 0);

        conn.call("Page.enable", json!({}), Some("S1")).await.unwrap();
        assert_eq!(conn.pending_calls(), 0);
    }

    #[tokio::test]
    async fn connect_to_nothing_is_a_launch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = CdpConnection::connect(&format!("ws://{}/", addr)).await;
        assert!(matches!(result, Err(LaunchError::ConnectionFailed(_))));
    }
}
