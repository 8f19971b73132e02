// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Types describing the exchange a role declares. Exchanges receive published
//! messages and forward them to bound queues by matching routing keys against the
//! binding patterns (`*` one word, `#` zero or more words).

use lapin::{options::ExchangeDeclareOptions, ExchangeKind};

/// Definition of a non-durable RabbitMQ topic exchange.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition<'ex> {
    pub(crate) name: &'ex str,
    pub(crate) delete: bool,
}

impl<'ex> ExchangeDefinition<'ex> {
    pub fn new(name: &'ex str) -> ExchangeDefinition<'ex> {
        ExchangeDefinition {
            name,
            delete: false,
        }
    }

    /// Sets the exchange to auto-delete once its last binding is removed.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub(crate) fn kind(&self) -> ExchangeKind {
        ExchangeKind::Topic
    }

    pub(crate) fn declare_options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: false,
            durable: false,
            auto_delete: self.delete,
            internal: false,
            nowait: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_topic_exchange() {
        let def = ExchangeDefinition::new("EXCHANGE3");
        let opts = def.declare_options();

        assert!(matches!(def.kind(), ExchangeKind::Topic));
        assert!(!opts.durable);
        assert!(!opts.auto_delete);
        assert!(!opts.passive);
    }

    #[test]
    fn auto_delete_exchange() {
        let opts = ExchangeDefinition::new("EXCHANGE3").delete().declare_options();

        assert!(opts.auto_delete);
        assert!(!opts.durable);
        assert!(!opts.internal);
    }
}
