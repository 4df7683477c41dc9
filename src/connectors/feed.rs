// src/connectors/feed.rs
use crate::connectors::messages::{Channel, Subscribe, TickerEvent};
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Decimal,
    received_at: Instant,
}

/// Latest streamed price per pair, shared between the feed task and the engine.
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    inner: Arc<RwLock<HashMap<String, CachedPrice>>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, pair: &str, price: Decimal) {
        self.inner.write().await.insert(
            pair.to_ascii_uppercase(),
            CachedPrice {
                price,
                received_at: Instant::now(),
            },
        );
    }

    /// Price received within `max_age`, if any.
    pub async fn fresh(&self, pair: &str, max_age: Duration) -> Option<Decimal> {
        let guard = self.inner.read().await;
        guard
            .get(&pair.to_ascii_uppercase())
            .filter(|cached| cached.received_at.elapsed() <= max_age)
            .map(|cached| cached.price)
    }
}

/// Streams the Bitvavo `ticker` channel for all pairs into a `PriceCache`.
pub struct TickerFeed {
    ws_url: String,
    pairs: Vec<String>,
    cache: PriceCache,
}

impl TickerFeed {
    pub fn new(ws_url: String, pairs: Vec<String>, cache: PriceCache) -> Self {
        Self {
            ws_url,
            pairs,
            cache,
        }
    }

    /// Runs until shutdown, reconnecting with capped exponential backoff.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                tokio::select! {
                    result = self.stream_once() => match result {
                        Ok(updates) => {
                            info!("Ticker stream closed after {} updates", updates);
                            if updates > 0 {
                                backoff = Duration::from_secs(1);
                            }
                        }
                        Err(e) => warn!("Ticker stream error: {}", e),
                    },
                    _ = shutdown.changed() => break,
                }

                if *shutdown.borrow() {
                    break;
                }
                debug!("Reconnecting ticker stream in {:?}", backoff);
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => break,
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            info!("Ticker feed stopped");
        })
    }

    async fn stream_once(&self) -> Result<usize> {
        let url = Url::parse(&self.ws_url)?;
        let (ws_stream, _) = connect_async(url).await?;
        let (mut write, mut read) = ws_stream.split();
        info!("WebSocket connected, subscribing to {:?}", self.pairs);

        let subscribe = Subscribe {
            action: "subscribe",
            channels: vec![Channel {
                name: "ticker",
                markets: &self.pairs,
            }],
        };
        write
            .send(Message::Text(serde_json::to_string(&subscribe)?))
            .await?;

        let mut updates = 0usize;
        while let Some(message) = read.next().await {
            match message? {
                Message::Text(text) => {
                    let Ok(event) = serde_json::from_str::<TickerEvent>(&text) else {
                        continue;
                    };
                    if event.event != "ticker" {
                        continue;
                    }
                    if let Some(price) = event.price() {
                        self.cache.update(&event.market, price).await;
                        updates += 1;
                    }
                }
                Message::Ping(payload) => write.send(Message::Pong(payload)).await?,
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(updates)
    }
}
