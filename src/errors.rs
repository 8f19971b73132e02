// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Topic Publish/Subscribe Client
//!
//! This module provides the error types for broker operations. The `AmqpError` enum
//! separates failures to reach the broker from declarations that conflict with the
//! topology the broker already holds, so operators can tell "broker down" apart from
//! "misconfigured topology".

use lapin::protocol::{AMQPErrorKind, AMQPSoftError};
use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect: {0}")]
    ConnectionError(String),

    /// The connection attempt did not complete in time
    #[error("connection attempt timed out after {0}ms")]
    ConnectionTimeout(u64),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// An operation failed because the connection or channel went away under it
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// A declaration conflicts with an existing, incompatible declaration on the broker
    #[error("topology conflict on `{entity}`: {reason}")]
    TopologyConflict { entity: String, reason: String },

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{1}` to exchange `{0}`")]
    BindingExchangeToQueueError(String, String),

    /// Error removing the binding between a queue and an exchange
    #[error("failure to unbind queue `{1}` from exchange `{0}`")]
    UnbindingExchangeToQueueError(String, String),

    /// Error publishing a message
    #[error("failure to publish: {0}")]
    PublishingError(String),

    /// Error declaring a consumer
    #[error("failure to declare consumer on queue `{0}`")]
    ConsumerDeclarationError(String),

    /// Error consuming a message
    #[error("failure to consume message: {0}")]
    ConsumerError(String),

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// A message handler rejected a delivery
    #[error("handler failure: {0}")]
    HandlerError(String),
}

impl AmqpError {
    /// Returns true when the error means the broker could not be reached or the
    /// connection/channel went away.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            AmqpError::ConnectionError(_)
                | AmqpError::ConnectionTimeout(_)
                | AmqpError::ChannelError(_)
                | AmqpError::ConnectionLost(_)
                | AmqpError::ConsumerError(_)
        )
    }

    /// Returns true when a declaration was refused because of incompatible broker state.
    pub fn is_topology_conflict(&self) -> bool {
        matches!(self, AmqpError::TopologyConflict { .. })
    }
}

/// Tells whether a lapin error is the broker refusing a declaration that clashes with
/// existing state (406 PRECONDITION_FAILED, or 405 RESOURCE_LOCKED for queues held
/// exclusively by another connection).
pub(crate) fn is_conflict(err: &lapin::Error) -> bool {
    match err {
        lapin::Error::ProtocolError(amqp_err) => matches!(
            amqp_err.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
                | AMQPErrorKind::Soft(AMQPSoftError::RESOURCELOCKED)
        ),
        _ => false,
    }
}

/// Tells whether a lapin error comes from a dead socket or from a connection/channel
/// that is no longer open.
pub(crate) fn is_connection_lost(err: &lapin::Error) -> bool {
    matches!(
        err,
        lapin::Error::IOError(_)
            | lapin::Error::InvalidConnectionState(_)
            | lapin::Error::InvalidChannelState(_)
    )
}

/// Maps a failed broker operation into `ConnectionLost` or the fallback error.
pub(crate) fn operation_error(
    err: &lapin::Error,
    fallback: impl FnOnce() -> AmqpError,
) -> AmqpError {
    if is_connection_lost(err) {
        AmqpError::ConnectionLost(err.to_string())
    } else {
        fallback()
    }
}

/// Maps a failed declaration into a conflict, a lost connection or the fallback error.
pub(crate) fn declaration_error(
    entity: &str,
    err: &lapin::Error,
    fallback: impl FnOnce() -> AmqpError,
) -> AmqpError {
    if is_conflict(err) {
        AmqpError::TopologyConflict {
            entity: entity.to_owned(),
            reason: err.to_string(),
        }
    } else {
        operation_error(err, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io, sync::Arc};

    #[test]
    fn classifies_connectivity_errors() {
        assert!(AmqpError::ConnectionError("refused".to_owned()).is_connectivity());
        assert!(AmqpError::ConnectionTimeout(10).is_connectivity());
        assert!(!AmqpError::DeclareQueueError("q".to_owned()).is_connectivity());
    }

    #[test]
    fn conflict_is_not_connectivity() {
        let err = AmqpError::TopologyConflict {
            entity: "rabbit-queue".to_owned(),
            reason: "inequivalent arg 'durable'".to_owned(),
        };

        assert!(err.is_topology_conflict());
        assert!(!err.is_connectivity());
    }

    #[test]
    fn io_failure_during_declaration_is_connectivity() {
        let err = lapin::Error::IOError(Arc::new(io::Error::from(io::ErrorKind::ConnectionReset)));

        let mapped = declaration_error("EXCHANGE3", &err, || {
            AmqpError::DeclareExchangeError("EXCHANGE3".to_owned())
        });

        assert!(matches!(mapped, AmqpError::ConnectionLost(_)));
        assert!(mapped.is_connectivity());
        assert!(!mapped.is_topology_conflict());
    }

    #[test]
    fn closed_connection_while_publishing_is_connectivity() {
        let err = lapin::Error::InvalidConnectionState(lapin::ConnectionState::Closed);

        let mapped = operation_error(&err, || AmqpError::PublishingError(err.to_string()));

        assert!(matches!(mapped, AmqpError::ConnectionLost(_)));
        assert!(mapped.is_connectivity());
    }

    #[test]
    fn closed_channel_while_unbinding_is_connectivity() {
        let err = lapin::Error::InvalidChannelState(lapin::ChannelState::Closed);

        let mapped = operation_error(&err, || {
            AmqpError::UnbindingExchangeToQueueError(
                "EXCHANGE3".to_owned(),
                "rabbit-queue".to_owned(),
            )
        });

        assert!(mapped.is_connectivity());
    }

    #[test]
    fn other_failures_fall_back() {
        let err = lapin::Error::ChannelsLimitReached;

        let mapped = declaration_error("rabbit-queue", &err, || {
            AmqpError::DeclareQueueError("rabbit-queue".to_owned())
        });

        assert_eq!(mapped, AmqpError::DeclareQueueError("rabbit-queue".to_owned()));
        assert!(!mapped.is_connectivity());
    }
}
