// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use kegcore_bus::Subscriber;
use kegcore_events::{encode, Event};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::warn;

/// Forwards the outbound event kinds (see [`crate::OUTBOUND_KINDS`]) from
/// the hub to the external channel. Registered once per kind with the
/// `EventHub` at process wiring time.
pub struct OutboundBridge {
    conn: Mutex<MultiplexedConnection>,
    channel: String,
}

impl OutboundBridge {
    pub async fn connect(url: &str, channel: impl Into<String>) -> redis::RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn: Mutex::new(conn),
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl Subscriber for OutboundBridge {
    async fn handle(&self, event: &Event) {
        let payload = match encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(kind = event.kind(), error = %e, "failed to encode outbound event");
                return;
            }
        };
        let mut conn = self.conn.lock().await;
        let result: redis::RedisResult<()> = conn.publish(&self.channel, payload).await;
        if let Err(e) = result {
            warn!(kind = event.kind(), error = %e, "failed to publish outbound event, dropping");
        }
    }
}
