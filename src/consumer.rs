// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Processing
//!
//! Turns one delivery into a [`ReceivedMessage`], runs the handler and settles the
//! delivery with the broker. A successful handler acknowledges with `multiple` set,
//! covering every outstanding tag up to this one. A failing handler rejects the
//! delivery without requeue so a poison message cannot loop forever.

use crate::{
    errors::AmqpError,
    handler::{MessageHandler, ReceivedMessage},
    otel,
    settings::PayloadEncoding,
};
use lapin::{
    message::Delivery,
    options::{BasicAckOptions, BasicNackOptions},
};
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
    Context,
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// What to tell the broker about a processed delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Ack,
    Reject(String),
}

impl ReceivedMessage {
    pub(crate) fn decode(
        exchange: &str,
        routing_key: &str,
        delivery_tag: u64,
        data: &[u8],
        encoding: PayloadEncoding,
    ) -> ReceivedMessage {
        ReceivedMessage {
            exchange: exchange.to_owned(),
            routing_key: routing_key.to_owned(),
            delivery_tag,
            content: encoding.decode(data),
            data: data.to_vec(),
        }
    }
}

pub(crate) async fn process(
    handler: &dyn MessageHandler,
    ctx: &Context,
    msg: &ReceivedMessage,
) -> Outcome {
    match handler.exec(ctx, msg).await {
        Ok(()) => Outcome::Ack,
        Err(err) => Outcome::Reject(err.to_string()),
    }
}

pub(crate) async fn consume(
    tracer: &BoxedTracer,
    delivery: &Delivery,
    handler: &dyn MessageHandler,
    encoding: PayloadEncoding,
) -> Result<(), AmqpError> {
    let msg = ReceivedMessage::decode(
        delivery.exchange.as_str(),
        delivery.routing_key.as_str(),
        delivery.delivery_tag,
        &delivery.data,
        encoding,
    );

    let (ctx, mut span) = otel::new_span(&delivery.properties, tracer, &msg.routing_key);

    debug!(
        "received: {} - exchange: {} - tag: {}",
        msg.routing_key, msg.exchange, msg.delivery_tag
    );

    match process(handler, &ctx, &msg).await {
        Outcome::Ack => match delivery.ack(BasicAckOptions { multiple: true }).await {
            Err(e) => {
                error!("error whiling ack msg");
                span.record_error(&e);
                span.set_status(Status::Error {
                    description: Cow::from("error to ack msg"),
                });
                Err(AmqpError::AckMessageError)
            }
            _ => {
                span.set_status(Status::Ok);
                Ok(())
            }
        },
        Outcome::Reject(reason) => {
            warn!(reason = reason, "handler failure, rejecting message");
            span.set_status(Status::Error {
                description: Cow::from(reason),
            });

            match delivery
                .nack(BasicNackOptions {
                    multiple: false,
                    requeue: false,
                })
                .await
            {
                Err(e) => {
                    error!("error whiling nack msg");
                    span.record_error(&e);
                    Err(AmqpError::NackMessageError)
                }
                _ => Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::MockMessageHandler;

    fn message() -> ReceivedMessage {
        ReceivedMessage::decode(
            "EXCHANGE3",
            "rabbit-test",
            7,
            b"This message sent on 10/17/2026 10:00:00",
            PayloadEncoding::Ascii,
        )
    }

    #[test]
    fn decodes_payload_with_selected_encoding() {
        let msg = ReceivedMessage::decode("ex", "key", 1, "ça".as_bytes(), PayloadEncoding::Ascii);

        assert_eq!(msg.content, "??a");
        assert_eq!(msg.data, "ça".as_bytes());
        assert_eq!(msg.delivery_tag, 1);
    }

    #[tokio::test]
    async fn successful_handler_acks() {
        let mut handler = MockMessageHandler::new();
        handler
            .expect_exec()
            .withf(|_, msg| msg.content == "This message sent on 10/17/2026 10:00:00")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = process(&handler, &Context::new(), &message()).await;

        assert_eq!(outcome, Outcome::Ack);
    }

    #[tokio::test]
    async fn failing_handler_rejects() {
        let mut handler = MockMessageHandler::new();
        handler
            .expect_exec()
            .times(1)
            .returning(|_, _| Err(AmqpError::HandlerError("bad payload".to_owned())));

        let outcome = process(&handler, &Context::new(), &message()).await;

        assert_eq!(
            outcome,
            Outcome::Reject("handler failure: bad payload".to_owned())
        );
    }
}
