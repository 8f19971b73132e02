// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! This module declares the exchanges, queues and bindings a role depends on.
//!
//! The main components are:
//! - `Topology` trait: interface for registering and installing topology
//! - `AmqpTopology`: implementation of the trait over a lapin channel
//! - `TopicTopology`: the exchange/queue/routing-key triple both roles share, with
//!   the declaration shapes they use
//!
//! Declarations are idempotent under the broker's own rules: repeating an identical
//! declaration succeeds, a conflicting one surfaces as [`AmqpError::TopologyConflict`].

use crate::{
    errors::{declaration_error, operation_error, AmqpError},
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{options::QueueBindOptions, types::FieldTable, Channel};
use std::sync::Arc;
use tracing::{debug, error};

/// Trait defining the interface for topology management.
#[async_trait]
pub trait Topology<'tp> {
    /// Adds an exchange definition to the topology.
    fn exchange(self, def: &'tp ExchangeDefinition) -> Self;

    /// Adds a queue definition to the topology.
    fn queue(self, def: &'tp QueueDefinition) -> Self;

    /// Adds a queue-to-exchange binding to the topology.
    fn queue_binding(self, binding: &'tp QueueBinding) -> Self;

    /// Declares every exchange, then every queue, then every binding.
    async fn install(&self) -> Result<(), AmqpError>;

    /// Removes every registered queue-to-exchange binding.
    async fn uninstall_bindings(&self) -> Result<(), AmqpError>;
}

/// RabbitMQ implementation of the Topology trait.
pub struct AmqpTopology<'tp> {
    channel: Arc<Channel>,
    pub(crate) queues: Vec<&'tp QueueDefinition>,
    pub(crate) queues_binding: Vec<&'tp QueueBinding<'tp>>,
    pub(crate) exchanges: Vec<&'tp ExchangeDefinition<'tp>>,
}

impl<'tp> AmqpTopology<'tp> {
    pub fn new(channel: Arc<Channel>) -> AmqpTopology<'tp> {
        AmqpTopology {
            channel,
            queues: vec![],
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

#[async_trait]
impl<'tp> Topology<'tp> for AmqpTopology<'tp> {
    fn exchange(mut self, def: &'tp ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: &'tp QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: &'tp QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    async fn install(&self) -> Result<(), AmqpError> {
        self.install_exchange().await?;
        self.install_queue().await?;
        self.binding_queues().await
    }

    async fn uninstall_bindings(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            debug!(
                "unbinding queue: {} from the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            if let Err(err) = self
                .channel
                .queue_unbind(
                    binding.queue_name,
                    binding.exchange_name,
                    binding.routing_key,
                    FieldTable::default(),
                )
                .await
            {
                error!(error = err.to_string(), "error to unbind queue from exchange");
                return Err(operation_error(&err, || {
                    AmqpError::UnbindingExchangeToQueueError(
                        binding.exchange_name.to_owned(),
                        binding.queue_name.to_owned(),
                    )
                }));
            }
        }

        Ok(())
    }
}

impl AmqpTopology<'_> {
    async fn install_exchange(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    exch.name,
                    exch.kind(),
                    exch.declare_options(),
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = exch.name,
                        "error to declare the exchange"
                    );
                    Err(declaration_error(exch.name, &err, || {
                        AmqpError::DeclareExchangeError(exch.name.to_owned())
                    }))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queue(&self) -> Result<(), AmqpError> {
        for def in &self.queues {
            debug!("creating queue: {}", def.name);

            match self
                .channel
                .queue_declare(&def.name, def.declare_options(), FieldTable::default())
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = def.name,
                        "error to declare the queue"
                    );
                    Err(declaration_error(&def.name, &err, || {
                        AmqpError::DeclareQueueError(def.name.clone())
                    }))
                }
                _ => {
                    debug!("queue: {} was created", def.name);
                    Ok(())
                }
            }?;
        }

        Ok(())
    }

    async fn binding_queues(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
                .queue_bind(
                    binding.queue_name,
                    binding.exchange_name,
                    binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");

                    Err(operation_error(&err, || {
                        AmqpError::BindingExchangeToQueueError(
                            binding.exchange_name.to_owned(),
                            binding.queue_name.to_owned(),
                        )
                    }))
                }
                _ => Ok(()),
            }?;
        }

        debug!("queue was bounded");

        Ok(())
    }
}

/// The exchange, queue and routing key shared by the publisher and the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTopology {
    pub exchange_name: String,
    pub queue_name: String,
    pub routing_key: String,
}

impl TopicTopology {
    /// Topic exchange, non-durable, removed once its last binding goes away.
    pub fn exchange_definition(&self) -> ExchangeDefinition<'_> {
        ExchangeDefinition::new(&self.exchange_name).delete()
    }

    /// Durable queue, shared (not exclusive), removed once its last consumer leaves.
    pub fn queue_definition(&self) -> QueueDefinition {
        QueueDefinition::new(&self.queue_name).durable().delete()
    }

    pub fn binding(&self) -> QueueBinding<'_> {
        QueueBinding::new(&self.queue_name)
            .exchange(&self.exchange_name)
            .routing_key(&self.routing_key)
    }
}

/// Declares the exchange only.
pub async fn declare_exchange(
    channel: Arc<Channel>,
    topology: &TopicTopology,
) -> Result<(), AmqpError> {
    let exchange = topology.exchange_definition();

    AmqpTopology::new(channel).exchange(&exchange).install().await
}

/// Declares the exchange and the queue, without binding them.
pub async fn declare_exchange_and_queue(
    channel: Arc<Channel>,
    topology: &TopicTopology,
) -> Result<(), AmqpError> {
    let exchange = topology.exchange_definition();
    let queue = topology.queue_definition();

    AmqpTopology::new(channel)
        .exchange(&exchange)
        .queue(&queue)
        .install()
        .await
}

/// Binds the queue to the exchange with the routing key.
pub async fn bind_queue(channel: Arc<Channel>, topology: &TopicTopology) -> Result<(), AmqpError> {
    let binding = topology.binding();

    AmqpTopology::new(channel)
        .queue_binding(&binding)
        .install()
        .await
}

/// Removes the binding created by [`bind_queue`].
pub async fn unbind_queue(
    channel: Arc<Channel>,
    topology: &TopicTopology,
) -> Result<(), AmqpError> {
    let binding = topology.binding();

    AmqpTopology::new(channel)
        .queue_binding(&binding)
        .uninstall_bindings()
        .await
}

/// Declares exchange and queue and binds them.
pub async fn declare_topology(
    channel: Arc<Channel>,
    topology: &TopicTopology,
) -> Result<(), AmqpError> {
    let exchange = topology.exchange_definition();
    let queue = topology.queue_definition();
    let binding = topology.binding();

    AmqpTopology::new(channel)
        .exchange(&exchange)
        .queue(&queue)
        .queue_binding(&binding)
        .install()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::ExchangeKind;

    fn topology() -> TopicTopology {
        TopicTopology {
            exchange_name: "EXCHANGE3".to_owned(),
            queue_name: "rabbit-queue".to_owned(),
            routing_key: "rabbit.#".to_owned(),
        }
    }

    #[test]
    fn exchange_shape() {
        let topology = topology();
        let def = topology.exchange_definition();

        assert_eq!(def.name(), "EXCHANGE3");
        assert!(matches!(def.kind(), ExchangeKind::Topic));
        assert!(def.declare_options().auto_delete);
        assert!(!def.declare_options().durable);
    }

    #[test]
    fn queue_shape() {
        let def = topology().queue_definition();

        assert_eq!(def.name(), "rabbit-queue");
        assert!(def.durable);
        assert!(def.delete);
        assert!(!def.declare_options().exclusive);
    }

    #[test]
    fn binding_shape() {
        let topology = topology();
        let binding = topology.binding();

        assert_eq!(binding.queue_name, "rabbit-queue");
        assert_eq!(binding.exchange_name, "EXCHANGE3");
        assert_eq!(binding.routing_key, "rabbit.#");
    }
}
