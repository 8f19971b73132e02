// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Types describing the queue a role declares and the binding that ties it to an
//! exchange.

use lapin::options::QueueDeclareOptions;

/// Definition of a RabbitMQ queue with its declaration flags.
///
/// Built with the same chaining style as [`crate::exchange::ExchangeDefinition`].
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) delete: bool,
}

impl QueueDefinition {
    /// Creates a transient, shared queue definition with the given name.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..QueueDefinition::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the queue to auto-delete once its last consumer unsubscribes.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn declare_options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: false,
            durable: self.durable,
            exclusive: false,
            auto_delete: self.delete,
            nowait: false,
        }
    }
}

/// Configuration for binding a queue to an exchange.
///
/// The routing key is handed to the broker verbatim; topic wildcards (`*`, `#`)
/// are matched broker-side.
#[derive(Debug, Clone)]
pub struct QueueBinding<'qeb> {
    pub(crate) queue_name: &'qeb str,
    pub(crate) exchange_name: &'qeb str,
    pub(crate) routing_key: &'qeb str,
}

impl<'qeb> QueueBinding<'qeb> {
    /// Creates a new binding for the given queue with an empty exchange and key.
    pub fn new(queue: &'qeb str) -> QueueBinding<'qeb> {
        QueueBinding {
            queue_name: queue,
            exchange_name: "",
            routing_key: "",
        }
    }

    pub fn exchange(mut self, exchange: &'qeb str) -> Self {
        self.exchange_name = exchange;
        self
    }

    pub fn routing_key(mut self, key: &'qeb str) -> Self {
        self.routing_key = key;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durable_auto_delete_queue() {
        let opts = QueueDefinition::new("rabbit-queue")
            .durable()
            .delete()
            .declare_options();

        assert!(opts.durable);
        assert!(opts.auto_delete);
        assert!(!opts.exclusive);
        assert!(!opts.passive);
    }

    #[test]
    fn binding_keeps_pattern_verbatim() {
        let binding = QueueBinding::new("rabbit-queue")
            .exchange("EXCHANGE3")
            .routing_key("rabbit.*.#");

        assert_eq!(binding.queue_name, "rabbit-queue");
        assert_eq!(binding.exchange_name, "EXCHANGE3");
        assert_eq!(binding.routing_key, "rabbit.*.#");
    }
}
