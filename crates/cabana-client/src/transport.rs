//! Reconnecting websocket transport.
//!
//! One logical duplex channel per client process. Outbound events issued
//! while the socket is not open are queued in send order and flushed the
//! moment it opens. An unexpected close schedules a single fixed-backoff
//! reconnect; an explicit [`WsTransport::disconnect`] clears the queue and
//! the listeners and permanently suppresses auto-reconnect until the next
//! [`WsTransport::connect`].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use cabana_shared::constants::RECONNECT_DELAY;
use cabana_shared::protocol::{ClientEvent, ServerEvent};

type Listener = Box<dyn Fn(&ServerEvent) + Send + Sync + 'static>;

enum SocketState {
    Idle,
    Connecting,
    Open(mpsc::UnboundedSender<Message>),
}

/// Handle returned by [`WsTransport::on_message`]; call
/// [`ListenerGuard::unsubscribe`] to detach the handler.
pub struct ListenerGuard {
    id: u64,
    inner: Weak<TransportInner>,
}

impl ListenerGuard {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .lock()
                .expect("listener mutex poisoned")
                .remove(&self.id);
        }
    }
}

struct TransportInner {
    url: String,
    state: Mutex<SocketState>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_listener: AtomicU64,
    pending: Mutex<VecDeque<String>>,
    should_reconnect: AtomicBool,
    /// Bumped on every connect attempt and on disconnect; a connection task
    /// whose epoch is stale must not touch shared state or reconnect.
    epoch: AtomicU64,
    reconnect_timer: Mutex<Option<JoinHandle<()>>>,
}

/// The client's logical websocket connection.
#[derive(Clone)]
pub struct WsTransport {
    inner: Arc<TransportInner>,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TransportInner {
                url: url.into(),
                state: Mutex::new(SocketState::Idle),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
                pending: Mutex::new(VecDeque::new()),
                should_reconnect: AtomicBool::new(true),
                epoch: AtomicU64::new(0),
                reconnect_timer: Mutex::new(None),
            }),
        }
    }

    /// Open the connection. Idempotent while already connecting or open.
    pub fn connect(&self) {
        self.inner.should_reconnect.store(true, Ordering::SeqCst);
        start_connect(&self.inner);
    }

    /// Send an event, queueing it in FIFO order while the socket is not
    /// open. Queued events are flushed the moment the socket opens.
    pub fn send(&self, event: &ClientEvent) {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound event");
                return;
            }
        };

        let state = self.inner.state.lock().expect("state mutex poisoned");
        if let SocketState::Open(tx) = &*state {
            if tx.send(Message::Text(payload.clone())).is_ok() {
                return;
            }
            // Writer is gone but the close has not been observed yet; fall
            // through and queue for the next connection.
        }

        self.inner
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .push_back(payload);
    }

    /// Register a handler for inbound events. Every registered handler sees
    /// every parsed frame until unsubscribed or the transport disconnects.
    pub fn on_message(
        &self,
        handler: impl Fn(&ServerEvent) + Send + Sync + 'static,
    ) -> ListenerGuard {
        let id = self.inner.next_listener.fetch_add(1, Ordering::SeqCst);
        self.inner
            .listeners
            .lock()
            .expect("listener mutex poisoned")
            .insert(id, Box::new(handler));

        ListenerGuard {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Close the connection and tear the transport down: the outbound queue
    /// and all listeners are cleared, and auto-reconnect stays suppressed
    /// until [`WsTransport::connect`] is called again.
    pub fn disconnect(&self) {
        self.inner.should_reconnect.store(false, Ordering::SeqCst);
        // Orphan any in-flight connection task.
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(timer) = self
            .inner
            .reconnect_timer
            .lock()
            .expect("timer mutex poisoned")
            .take()
        {
            timer.abort();
        }

        let previous = {
            let mut state = self.inner.state.lock().expect("state mutex poisoned");
            std::mem::replace(&mut *state, SocketState::Idle)
        };
        if let SocketState::Open(tx) = previous {
            let _ = tx.send(Message::Close(None));
        }

        self.inner
            .listeners
            .lock()
            .expect("listener mutex poisoned")
            .clear();
        self.inner
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .clear();
    }
}

fn start_connect(inner: &Arc<TransportInner>) {
    {
        let mut state = inner.state.lock().expect("state mutex poisoned");
        match *state {
            SocketState::Connecting | SocketState::Open(_) => return,
            SocketState::Idle => *state = SocketState::Connecting,
        }
    }

    if let Some(timer) = inner
        .reconnect_timer
        .lock()
        .expect("timer mutex poisoned")
        .take()
    {
        timer.abort();
    }

    let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let task_inner = Arc::clone(inner);
    tokio::spawn(async move {
        run_connection(task_inner, epoch).await;
    });
}

async fn run_connection(inner: Arc<TransportInner>, epoch: u64) {
    let socket = match tokio_tungstenite::connect_async(inner.url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            warn!(error = %e, "websocket connect failed");
            on_closed(&inner, epoch);
            return;
        }
    };

    debug!(url = %inner.url, "websocket open");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    {
        let mut state = inner.state.lock().expect("state mutex poisoned");
        if inner.epoch.load(Ordering::SeqCst) != epoch {
            // disconnect() raced the handshake; abandon the socket.
            return;
        }
        // Flush queued frames in send order before the state flips to open,
        // so no concurrent send can jump the queue.
        let mut pending = inner.pending.lock().expect("pending mutex poisoned");
        for payload in pending.drain(..) {
            let _ = out_tx.send(Message::Text(payload));
        }
        *state = SocketState::Open(out_tx);
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let is_close = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || is_close {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(raw)) => dispatch_frame(&inner, &raw),
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(error = %e, "websocket read error");
                break;
            }
            Ok(_) => {}
        }
    }

    writer.abort();
    on_closed(&inner, epoch);
}

/// Parse one inbound frame and fan it out to all listeners. A parse failure
/// is logged and skipped; it never takes the transport down.
fn dispatch_frame(inner: &TransportInner, raw: &str) {
    let event = match ServerEvent::from_json(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "failed to parse server frame");
            return;
        }
    };

    let listeners = inner.listeners.lock().expect("listener mutex poisoned");
    for handler in listeners.values() {
        handler(&event);
    }
}

fn on_closed(inner: &Arc<TransportInner>, epoch: u64) {
    if inner.epoch.load(Ordering::SeqCst) != epoch {
        // A newer connection (or an explicit disconnect) owns the state.
        return;
    }

    *inner.state.lock().expect("state mutex poisoned") = SocketState::Idle;

    if !inner.should_reconnect.load(Ordering::SeqCst) {
        return;
    }

    debug!(delay = ?RECONNECT_DELAY, "scheduling reconnect");
    let timer_inner = Arc::clone(inner);
    let handle = tokio::spawn(async move {
        tokio::time::sleep(RECONNECT_DELAY).await;
        if timer_inner.should_reconnect.load(Ordering::SeqCst) {
            start_connect(&timer_inner);
        }
    });

    if let Some(old) = inner
        .reconnect_timer
        .lock()
        .expect("timer mutex poisoned")
        .replace(handle)
    {
        old.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use cabana_shared::types::ChannelId;
    use tokio::net::TcpListener;

    use super::*;

    /// Accept connections forever, recording text frames and accept counts.
    fn spawn_recording_server(
        listener: TcpListener,
        frames: Arc<Mutex<Vec<String>>>,
        accepts: Arc<AtomicUsize>,
    ) {
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accepts.fetch_add(1, Ordering::SeqCst);
                let frames = Arc::clone(&frames);
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        if let Message::Text(text) = message {
                            frames.lock().unwrap().push(text);
                        }
                    }
                });
            }
        });
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..500 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 5s");
    }

    #[tokio::test]
    async fn test_queued_messages_flush_in_fifo_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let accepts = Arc::new(AtomicUsize::new(0));
        spawn_recording_server(listener, Arc::clone(&frames), Arc::clone(&accepts));

        let transport = WsTransport::new(format!("ws://{addr}"));

        // Sent while disconnected: queued, never dropped.
        transport.send(&ClientEvent::ChannelJoin {
            channel_id: ChannelId(1),
        });
        transport.send(&ClientEvent::TypingStart);
        transport.send(&ClientEvent::TypingStop);

        transport.connect();
        wait_for(|| frames.lock().unwrap().len() == 3).await;

        let received = frames.lock().unwrap().clone();
        assert_eq!(
            received,
            vec![
                r#"{"type":"channel:join","channelId":1}"#.to_string(),
                r#"{"type":"typing:start"}"#.to_string(),
                r#"{"type":"typing:stop"}"#.to_string(),
            ]
        );

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_while_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let accepts = Arc::new(AtomicUsize::new(0));
        spawn_recording_server(listener, frames, Arc::clone(&accepts));

        let transport = WsTransport::new(format!("ws://{addr}"));
        transport.connect();
        transport.connect();
        wait_for(|| accepts.load(Ordering::SeqCst) >= 1).await;

        transport.connect();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_bad_frame_is_skipped_and_listeners_keep_firing() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let transport = WsTransport::new(format!("ws://{addr}"));
        let received: Arc<Mutex<Vec<ServerEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let _guard = transport.on_message(move |event| {
            sink.lock().unwrap().push(event.clone());
        });

        // A second listener detached before any frame arrives.
        let ignored: Arc<Mutex<Vec<ServerEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let ignored_sink = Arc::clone(&ignored);
        let guard = transport.on_message(move |event| {
            ignored_sink.lock().unwrap().push(event.clone());
        });
        guard.unsubscribe();

        transport.connect();

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        ws.send(Message::Text("garbage".into())).await.unwrap();
        ws.send(Message::Text(
            ServerEvent::UserJoined {
                username: "ada".into(),
            }
            .to_json()
            .unwrap(),
        ))
        .await
        .unwrap();

        wait_for(|| received.lock().unwrap().len() == 1).await;
        assert_eq!(
            received.lock().unwrap()[0],
            ServerEvent::UserJoined {
                username: "ada".into()
            }
        );
        assert!(ignored.lock().unwrap().is_empty());

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_reconnects_after_unexpected_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));

        // Server that drops every connection right after the handshake.
        let server_accepts = Arc::clone(&accepts);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                server_accepts.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let _ = tokio_tungstenite::accept_async(stream).await;
                    // Dropping the socket closes it.
                });
            }
        });

        let transport = WsTransport::new(format!("ws://{addr}"));
        transport.connect();

        // The fixed backoff fires and a second connection is attempted.
        wait_for(|| accepts.load(Ordering::SeqCst) >= 2).await;

        transport.disconnect();
    }

    #[tokio::test]
    async fn test_disconnect_suppresses_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let accepts = Arc::new(AtomicUsize::new(0));
        spawn_recording_server(listener, frames, Arc::clone(&accepts));

        let transport = WsTransport::new(format!("ws://{addr}"));
        transport.connect();
        wait_for(|| accepts.load(Ordering::SeqCst) == 1).await;

        transport.disconnect();

        // The close triggered by disconnect must not schedule a reconnect,
        // even after the backoff window has passed.
        tokio::time::sleep(RECONNECT_DELAY + Duration::from_millis(500)).await;
        assert_eq!(accepts.load(Ordering::SeqCst), 1);
    }
}
