// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topic Subscriber
//!
//! The consuming role. It declares the exchange and queue, starts a manual-ack
//! consumer, binds the queue and then waits for either the shutdown token or the
//! broker closing the consumer. Either way the queue is unbound before the session
//! is closed.

use crate::{
    channel::{AmqpSession, ConnectionFactory},
    dispatcher::RabbitMQDispatcher,
    errors::AmqpError,
    handler::{LoggingHandler, MessageHandler},
    settings::Settings,
    topology::{bind_queue, declare_exchange_and_queue, unbind_queue, TopicTopology},
};
use lapin::Channel;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long an in-flight delivery may take to settle once the consumer is cancelled
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TopicSubscriber {
    factory: Arc<dyn ConnectionFactory>,
    settings: Settings,
    topology: TopicTopology,
    handler: Arc<dyn MessageHandler>,
}

impl TopicSubscriber {
    /// Creates a subscriber that logs every received message.
    pub fn new(factory: Arc<dyn ConnectionFactory>, settings: Settings) -> TopicSubscriber {
        let topology = settings.topology();

        TopicSubscriber {
            factory,
            settings,
            topology,
            handler: Arc::new(LoggingHandler),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Consumes until `shutdown` fires (`Ok`) or the broker ends the consumer (`Err`).
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), AmqpError> {
        info!(
            "Starting listener for exchange: {} queue: {}",
            self.topology.exchange_name, self.topology.queue_name
        );

        let result = match self.factory.connect().await {
            Ok(session) => {
                let result = self.listen(&session, &shutdown).await;
                session.close().await;
                result
            }
            Err(err) => Err(err),
        };

        match &result {
            Ok(()) => info!("subscriber stopped"),
            Err(err) => error!(
                error = err.to_string(),
                connectivity = err.is_connectivity(),
                topology_conflict = err.is_topology_conflict(),
                "subscriber failed"
            ),
        }

        result
    }

    async fn listen(
        &self,
        session: &AmqpSession,
        shutdown: &CancellationToken,
    ) -> Result<(), AmqpError> {
        let channel = session.channel.clone();

        declare_exchange_and_queue(channel.clone(), &self.topology).await?;

        let dispatcher = RabbitMQDispatcher::new(
            channel.clone(),
            &self.topology.queue_name,
            self.handler.clone(),
            self.settings.payload_encoding,
        );
        let mut consuming = dispatcher.start().await?;

        if let Err(err) = bind_queue(channel.clone(), &self.topology).await {
            if let Err(cancel_err) = dispatcher.cancel().await {
                debug!(error = cancel_err.to_string(), "failure to cancel the consumer");
            }
            drain(consuming).await;
            return Err(err);
        }

        info!(
            consumer_tag = dispatcher.consumer_tag(),
            "Starting message processing for exchange: {} queue: {} key: {}",
            self.topology.exchange_name,
            self.topology.queue_name,
            self.topology.routing_key
        );

        let shutdown_requested = tokio::select! {
            _ = shutdown.cancelled() => true,
            _ = &mut consuming => false,
        };

        if shutdown_requested {
            // Unbind while the queue still has its consumer: cancelling first would let
            // the broker auto-delete the queue underneath the unbind.
            let unbound = self.on_shutdown(channel).await;
            let cancelled = dispatcher.cancel().await;
            drain(consuming).await;

            return unbound.and(cancelled);
        }

        warn!("consumer closed by the broker");
        if self.on_shutdown(channel).await.is_err() {
            warn!("binding left in place, channel is gone");
        }

        Err(AmqpError::ConsumerError(
            "consumer stream closed by the broker".to_owned(),
        ))
    }

    async fn on_shutdown(&self, channel: Arc<Channel>) -> Result<(), AmqpError> {
        info!("Shutting down worker");

        unbind_queue(channel, &self.topology).await?;

        info!("Listener stopped via shutdown event");
        Ok(())
    }
}

async fn drain(mut consuming: JoinHandle<()>) {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut consuming).await {
        Ok(Err(err)) => error!(error = err.to_string(), "consumer task failed"),
        Err(_) => {
            warn!("consumer task did not finish in time, aborting");
            consuming.abort();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockConnectionFactory;

    #[tokio::test]
    async fn run_returns_connectivity_error_promptly() {
        let mut factory = MockConnectionFactory::new();
        factory
            .expect_connect()
            .times(1)
            .returning(|| Err(AmqpError::ConnectionTimeout(10_000)));

        let subscriber = TopicSubscriber::new(Arc::new(factory), Settings::default());

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            subscriber.run(CancellationToken::new()),
        )
        .await
        .expect("run should not hang");

        assert_eq!(result, Err(AmqpError::ConnectionTimeout(10_000)));
    }
}
