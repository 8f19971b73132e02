// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Dispatcher
//!
//! Starts a manual-ack consumer on a queue and feeds every delivery to a
//! [`MessageHandler`] on a spawned task. The task ends when the consumer is
//! cancelled or the channel goes away.

use crate::{
    consumer::consume,
    errors::{operation_error, AmqpError},
    handler::MessageHandler,
    settings::PayloadEncoding,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicCancelOptions, BasicConsumeOptions},
    types::FieldTable,
    Channel,
};
use opentelemetry::global;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

pub struct RabbitMQDispatcher {
    channel: Arc<Channel>,
    queue_name: String,
    consumer_tag: String,
    handler: Arc<dyn MessageHandler>,
    encoding: PayloadEncoding,
}

impl RabbitMQDispatcher {
    pub fn new(
        channel: Arc<Channel>,
        queue_name: &str,
        handler: Arc<dyn MessageHandler>,
        encoding: PayloadEncoding,
    ) -> Self {
        RabbitMQDispatcher {
            channel,
            queue_name: queue_name.to_owned(),
            consumer_tag: format!("{}-{}", queue_name, Uuid::new_v4()),
            handler,
            encoding,
        }
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }

    /// Registers the consumer and spawns the task processing its deliveries.
    pub async fn start(&self) -> Result<JoinHandle<()>, AmqpError> {
        let mut consumer = match self
            .channel
            .basic_consume(
                &self.queue_name,
                &self.consumer_tag,
                BasicConsumeOptions {
                    no_local: true,
                    no_ack: false,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(operation_error(&err, || {
                    AmqpError::ConsumerDeclarationError(self.queue_name.clone())
                }))
            }
            Ok(c) => Ok(c),
        }?;

        let handler = self.handler.clone();
        let encoding = self.encoding;

        Ok(tokio::spawn(async move {
            let tracer = global::tracer("amqp consumer");

            while let Some(result) = consumer.next().await {
                match result {
                    Ok(delivery) => {
                        if let Err(err) =
                            consume(&tracer, &delivery, handler.as_ref(), encoding).await
                        {
                            error!(error = err.to_string(), "error consume msg");
                        }
                    }
                    Err(err) => {
                        error!(error = err.to_string(), "errors consume msg");
                        break;
                    }
                }
            }

            debug!("consumer stream ended");
        }))
    }

    /// Asks the broker to stop delivering to this consumer.
    pub async fn cancel(&self) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_cancel(&self.consumer_tag, BasicCancelOptions::default())
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to cancel the consumer");
                Err(AmqpError::ConsumerError(err.to_string()))
            }
            _ => Ok(()),
        }
    }
}
