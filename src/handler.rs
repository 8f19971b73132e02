// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Handlers
//!
//! A [`MessageHandler`] is invoked once per delivery, on the subscriber's consumer
//! task, concurrently with the subscriber's wait for shutdown. Implementations must
//! not rely on exclusive access to shared mutable state. Returning `Ok` acknowledges
//! the delivery; returning `Err` rejects it without requeue.

use crate::errors::AmqpError;
use async_trait::async_trait;
use opentelemetry::Context;
use tracing::info;

#[cfg(test)]
use mockall::automock;

/// A delivery as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub delivery_tag: u64,
    /// Payload decoded with the configured [`crate::settings::PayloadEncoding`]
    pub content: String,
    pub data: Vec<u8>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn exec(&self, ctx: &Context, msg: &ReceivedMessage) -> Result<(), AmqpError>;
}

/// Logs every message it receives.
#[derive(Debug, Default)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    async fn exec(&self, _ctx: &Context, msg: &ReceivedMessage) -> Result<(), AmqpError> {
        info!(
            routing_key = msg.routing_key,
            delivery_tag = msg.delivery_tag,
            "Received message: {}",
            msg.content
        );
        Ok(())
    }
}
