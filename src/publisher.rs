// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! `RabbitMQPublisher` sends raw payloads to an exchange with a routing key and no
//! message properties. `TopicPublisher` is the publishing role: a timed loop that
//! runs until cancelled, and a one-shot `send`.

use crate::{
    channel::{AmqpSession, ConnectionFactory},
    errors::{operation_error, AmqpError},
    settings::Settings,
    topology::{declare_exchange, declare_exchange_and_queue, TopicTopology},
};
use chrono::Local;
use lapin::{options::BasicPublishOptions, BasicProperties, Channel};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Publishes payloads over one channel. Fire-and-forget, no publisher confirms.
pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    pub fn new(channel: Arc<Channel>) -> Arc<RabbitMQPublisher> {
        Arc::new(RabbitMQPublisher { channel })
    }

    pub async fn publish(&self, exchange: &str, key: &str, data: &[u8]) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                data,
                BasicProperties::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(operation_error(&err, || {
                    AmqpError::PublishingError(err.to_string())
                }))
            }
            _ => Ok(()),
        }
    }
}

/// Body of the messages emitted by the publishing loop.
pub fn timestamped_message() -> String {
    format!(
        "This message sent on {}",
        Local::now().format("%m/%d/%Y %-I:%M:%S %p")
    )
}

/// The publishing role.
pub struct TopicPublisher {
    factory: Arc<dyn ConnectionFactory>,
    settings: Settings,
    topology: TopicTopology,
}

impl TopicPublisher {
    pub fn new(factory: Arc<dyn ConnectionFactory>, settings: Settings) -> TopicPublisher {
        let topology = settings.topology();

        TopicPublisher {
            factory,
            settings,
            topology,
        }
    }

    /// Publishes a timestamped message every `send_interval` until `shutdown` fires.
    ///
    /// Any broker failure ends the loop; there is no reconnect. The session is closed
    /// on every exit path.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), AmqpError> {
        info!(
            exchange = self.topology.exchange_name,
            queue = self.topology.queue_name,
            "starting publisher"
        );

        let result = match self.factory.connect().await {
            Ok(session) => {
                let result = self.publish_loop(&session, &shutdown).await;
                session.close().await;
                result
            }
            Err(err) => Err(err),
        };

        match &result {
            Ok(()) => info!("publisher stopped"),
            Err(err) => error!(
                error = err.to_string(),
                connectivity = err.is_connectivity(),
                topology_conflict = err.is_topology_conflict(),
                "publisher failed"
            ),
        }

        result
    }

    async fn publish_loop(
        &self,
        session: &AmqpSession,
        shutdown: &CancellationToken,
    ) -> Result<(), AmqpError> {
        declare_exchange_and_queue(session.channel.clone(), &self.topology).await?;

        let publisher = RabbitMQPublisher::new(session.channel.clone());

        while !shutdown.is_cancelled() {
            let message = timestamped_message();

            publisher
                .publish(
                    &self.topology.exchange_name,
                    &self.topology.routing_key,
                    message.as_bytes(),
                )
                .await?;

            info!(routing_key = self.topology.routing_key, "Sending message: {}", message);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.settings.send_interval) => {}
            }
        }

        Ok(())
    }

    /// Publishes one message on a fresh session.
    ///
    /// `None` and empty messages are skipped without contacting the broker and count as
    /// success. Any failure yields `false`; the cause is intentionally not reported.
    pub async fn send(&self, message: Option<&str>) -> bool {
        let Some(message) = message.filter(|m| !m.is_empty()) else {
            return true;
        };

        let Ok(session) = self.factory.connect().await else {
            return false;
        };

        let result = async {
            declare_exchange(session.channel.clone(), &self.topology).await?;
            RabbitMQPublisher::new(session.channel.clone())
                .publish(
                    &self.topology.exchange_name,
                    &self.topology.routing_key,
                    message.as_bytes(),
                )
                .await
        }
        .await;

        session.close().await;

        result.is_ok()
    }
}
