//! The realtime bridge
//!
//! Couples the push channel's lifetime 1:1 to the session's authenticated
//! interval. The bridge owns the only channel handle: opening while a
//! channel exists closes the old one first, and teardown awaits the reader
//! task so no frame is processed after the session ended. Reconnection is
//! not attempted here; an unexpectedly closed stream just clears the handle.

use crate::events::{LocalUpdate, RealtimeEvent, ServerFrame, ServerTopic, Toast};
use crate::hub::EventHub;
use futures_util::StreamExt;
use instikit_client::AuthHandle;
use instikit_core::{InstikitConfig, InstikitError, InstikitResult};
use instikit_session::SessionEvent;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct ChannelHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the single push channel and translates its frames into hub traffic
pub struct RealtimeBridge {
    endpoint: Url,
    auth: Arc<AuthHandle>,
    hub: Arc<EventHub>,
    channel: Mutex<Option<ChannelHandle>>,
}

impl RealtimeBridge {
    /// Derive the push endpoint from the HTTP base URL (same host, ws/wss
    /// scheme, configured path).
    pub fn new(
        config: &InstikitConfig,
        auth: Arc<AuthHandle>,
        hub: Arc<EventHub>,
    ) -> InstikitResult<Arc<Self>> {
        let mut endpoint = Url::parse(&config.http.base_url).map_err(|e| {
            InstikitError::config(format!("invalid base URL {}: {}", config.http.base_url, e))
        })?;
        let scheme = if endpoint.scheme() == "https" { "wss" } else { "ws" };
        endpoint
            .set_scheme(scheme)
            .map_err(|_| InstikitError::realtime("cannot derive push endpoint scheme"))?;
        endpoint.set_path(&config.realtime.path);
        endpoint.set_query(None);

        Ok(Arc::new(Self {
            endpoint,
            auth,
            hub,
            channel: Mutex::new(None),
        }))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Follow session transitions until the event stream closes. One
    /// channel per authenticated interval, none outside it.
    pub fn run(self: Arc<Self>, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Authenticated { .. }) => {
                        if let Err(e) = self.open_channel().await {
                            warn!("failed to open realtime channel: {}", e);
                        }
                    }
                    Ok(SessionEvent::Anonymous { .. }) => {
                        self.close_channel().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session events lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        self.close_channel().await;
                        break;
                    }
                }
            }
        })
    }

    /// Open the push channel with the current credential. Any channel that
    /// is still open is closed first; two channels never coexist.
    pub async fn open_channel(&self) -> InstikitResult<()> {
        let mut channel = self.channel.lock().await;
        if let Some(existing) = channel.take() {
            warn!("realtime channel already open, closing it before reconnecting");
            shutdown_channel(existing).await;
        }

        let Some((token, _)) = self.auth.bearer().await else {
            return Err(InstikitError::realtime(
                "cannot open realtime channel without a credential",
            ));
        };

        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| InstikitError::realtime(format!("invalid push endpoint: {}", e)))?;
        let bearer = format!("Bearer {}", token)
            .parse()
            .map_err(|_| InstikitError::realtime("credential is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| InstikitError::realtime(format!("connect failed: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let hub = self.hub.clone();
        let task = tokio::spawn(read_loop(stream, hub, shutdown_rx));

        *channel = Some(ChannelHandle {
            shutdown: shutdown_tx,
            task,
        });
        info!(endpoint = %self.endpoint, "realtime channel open");
        Ok(())
    }

    /// Deterministic teardown: signal the reader and wait for it to exit.
    /// Safe to call when no channel is open.
    pub async fn close_channel(&self) {
        let mut channel = self.channel.lock().await;
        if let Some(handle) = channel.take() {
            shutdown_channel(handle).await;
            info!("realtime channel closed");
        }
    }

    /// Whether a live channel exists right now.
    pub async fn is_open(&self) -> bool {
        self.channel
            .lock()
            .await
            .as_ref()
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }
}

async fn shutdown_channel(handle: ChannelHandle) {
    // The reader may already be gone; a failed send just means that.
    let _ = handle.shutdown.send(());
    let _ = handle.task.await;
}

async fn read_loop(mut stream: WsStream, hub: Arc<EventHub>, mut shutdown: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&hub, text.as_str()),
                Some(Ok(Message::Close(_))) | None => {
                    warn!("realtime channel closed by the server");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("realtime channel error: {}", e);
                    break;
                }
            }
        }
    }
    // Best effort; the server may already have hung up.
    let _ = stream.close(None).await;
}

/// Translate one inbound frame into the two decoupled side effects: an
/// ambient toast and a typed refresh hint on the matching local channel.
fn handle_frame(hub: &EventHub, text: &str) {
    let frame: ServerFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!("dropping malformed realtime frame: {}", e);
            return;
        }
    };

    let Some(topic) = ServerTopic::parse(&frame.event) else {
        debug!(event = %frame.event, "dropping unknown realtime topic");
        return;
    };

    hub.notify(Toast::for_topic(topic));
    hub.publish(LocalUpdate::from_event(RealtimeEvent::new(
        topic,
        frame.payload,
    )));
}
