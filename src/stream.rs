//! Streaming ingestion client.
//!
//! Owns the persistent websocket subscription to the position feed: connect
//! within a bounded timeout, send the subscription payload immediately, then
//! sit in a blocking receive loop handing frames to the decoder. Any
//! transport or protocol failure funnels into one reconnect point with
//! exponential backoff; the loop only ends with process shutdown.

use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::database::Database;
use crate::decoder::{decode, Decoded};
use crate::errors::AisTrackerError;
use crate::models::Mmsi;

/// Provider-documented coordinate bounds; one near-global box.
const WORLD_BBOX: [[[f64; 2]; 2]; 1] = [[[-85.0, -179.9], [85.0, 179.9]]];

/// The provider accepts at most 50 MMSI filter entries.
const MAX_MMSI_FILTERS: usize = 50;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the subscription object sent right after connection establishment.
///
/// Pure function of its inputs: auth key, the operating-area bounding box,
/// the single message type the decoder understands, and an optional MMSI
/// allow-list. An empty watch set means "accept all" and the filter key is
/// omitted entirely.
pub fn subscription_payload(api_key: &str, watch: &[Mmsi]) -> Value {
    let mut payload = json!({
        "APIKey": api_key,
        "BoundingBoxes": WORLD_BBOX,
        "FilterMessageTypes": ["PositionReport"],
    });

    if !watch.is_empty() {
        let mmsi_filter: Vec<String> = watch
            .iter()
            .take(MAX_MMSI_FILTERS)
            .map(Mmsi::to_string)
            .collect();
        payload["FiltersShipMMSI"] = mmsi_filter.into();
    }

    payload
}

/// Reconnect delay state: starts at the floor, doubles per consecutive
/// failure, capped at the ceiling, reset on successful resubscription.
#[derive(Debug)]
pub struct Backoff {
    floor: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            current: floor,
        }
    }

    /// Delay to apply for the failure that just happened.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

/// Connection supervisor for the streaming feed.
pub struct StreamSupervisor {
    config: StreamConfig,
    watch: Vec<Mmsi>,
}

impl StreamSupervisor {
    pub fn new(config: StreamConfig) -> Result<Self, AisTrackerError> {
        let watch = config
            .watch_mmsi
            .iter()
            .map(|&raw| Mmsi::try_from(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { config, watch })
    }

    /// Run the connect-subscribe-receive cycle indefinitely.
    ///
    /// Every failure mode ends up here: log the cause, wait out the backoff,
    /// try again. Cancellation comes from the caller dropping the future.
    pub async fn run(&self, db: &Database) -> Result<(), AisTrackerError> {
        let mut backoff = Backoff::new(self.config.backoff_floor, self.config.backoff_ceiling);

        loop {
            if let Err(cause) = self.session(db, &mut backoff).await {
                let delay = backoff.next_delay();
                warn!("Connection lost: {cause}; reconnecting in {}s", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// One connection lifetime: connect, subscribe, receive until failure.
    async fn session(&self, db: &Database, backoff: &mut Backoff) -> Result<(), AisTrackerError> {
        info!("Connecting to {}", self.config.url);
        let (ws, _) = timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await
        .map_err(|_| AisTrackerError::ConnectTimeout)??;

        let (mut sink, mut stream) = ws.split();

        // The provider requires the subscription within 3 seconds of the
        // connection opening, so it goes out before anything else.
        let payload = subscription_payload(&self.config.api_key, &self.watch);
        sink.send(Message::Text(payload.to_string())).await?;
        info!("Subscribed; receiving position reports");
        backoff.reset();

        let result = self.receive_loop(&mut sink, &mut stream, db).await;
        // Best-effort close; the connection is already condemned.
        let _ = sink.close().await;
        result
    }

    async fn receive_loop(
        &self,
        sink: &mut SplitSink<WsStream, Message>,
        stream: &mut SplitStream<WsStream>,
        db: &Database,
    ) -> Result<(), AisTrackerError> {
        let mut ping = interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Silent network death shows as no inbound traffic at all, pongs
        // included, for longer than one ping round-trip allowance.
        let idle_limit = self.config.ping_interval + self.config.ping_timeout;
        let mut last_rx = Instant::now();
        let mut dropped: u64 = 0;

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let frame = match frame {
                        Some(frame) => frame?,
                        None => return Err(AisTrackerError::ConnectionClosed),
                    };
                    last_rx = Instant::now();
                    match frame {
                        Message::Text(raw) => self.handle_frame(&raw, db, &mut dropped).await?,
                        Message::Close(_) => return Err(AisTrackerError::ConnectionClosed),
                        // Pings are answered by the library; pongs and the
                        // rest only matter as proof of liveness.
                        _ => {}
                    }
                }
                _ = ping.tick() => {
                    if last_rx.elapsed() > idle_limit {
                        return Err(AisTrackerError::StaleConnection);
                    }
                    sink.send(Message::Ping(Vec::new())).await?;
                }
            }
        }
    }

    /// Decode one frame and write any resulting record through the store.
    ///
    /// Per-frame rejections stay here; server error frames and store
    /// failures propagate and take the connection down.
    async fn handle_frame(
        &self,
        raw: &str,
        db: &Database,
        dropped: &mut u64,
    ) -> Result<(), AisTrackerError> {
        match decode(raw, self.config.tanker_only, Utc::now().timestamp())? {
            Decoded::Record { position, vessel } => {
                let inserted = db.record_observation(&position, &vessel).await?;
                if inserted {
                    debug!(mmsi = %position.mmsi, "Stored position");
                } else {
                    trace!(mmsi = %position.mmsi, "Duplicate position, ignored");
                }
            }
            Decoded::Rejected(reason) => {
                if reason.is_unusable() {
                    *dropped += 1;
                    debug!(?reason, dropped, "Dropped unusable frame");
                } else {
                    trace!(?reason, "Ignored frame");
                }
            }
        }
        Ok(())
    }
}
