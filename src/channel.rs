// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! This module opens the connection and the single channel a role uses for all of
//! its broker operations. The factory is an explicit value, built once at startup
//! and handed to each role, so tests can substitute their own.

use crate::{configs::RabbitMQConfigs, errors::AmqpError};
use async_trait::async_trait;
use lapin::{tcp::OwnedTLSConfig, types::LongString, Channel, Connection, ConnectionProperties};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, warn};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

/// AMQP reply code for a normal shutdown
const REPLY_SUCCESS: u16 = 200;

/// A connection and the channel opened on it.
///
/// Both live for one `run` or `send` call and are closed through [`AmqpSession::close`].
#[derive(Clone)]
pub struct AmqpSession {
    pub connection: Arc<Connection>,
    pub channel: Arc<Channel>,
}

impl AmqpSession {
    /// Closes the channel, then the connection. Errors are logged and ignored since the
    /// broker may already have torn either down.
    pub async fn close(&self) {
        if self.channel.status().connected() {
            if let Err(err) = self.channel.close(REPLY_SUCCESS, "bye").await {
                debug!(error = err.to_string(), "failure to close the channel");
            }
        }

        if self.connection.status().connected() {
            if let Err(err) = self.connection.close(REPLY_SUCCESS, "bye").await {
                debug!(error = err.to_string(), "failure to close the connection");
            }
        }

        debug!("amqp session closed");
    }
}

/// Opens sessions against the broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<AmqpSession, AmqpError>;
}

/// Connection factory backed by lapin.
pub struct AmqpConnectionFactory {
    app_name: String,
    cfg: RabbitMQConfigs,
}

impl AmqpConnectionFactory {
    pub fn new(app_name: &str, cfg: &RabbitMQConfigs) -> Arc<AmqpConnectionFactory> {
        Arc::new(AmqpConnectionFactory {
            app_name: app_name.to_owned(),
            cfg: cfg.clone(),
        })
    }

    fn tls_config(&self) -> Result<OwnedTLSConfig, AmqpError> {
        let mut tls = OwnedTLSConfig::default();

        if let Some(path) = &self.cfg.tls.ca_cert_path {
            let chain = std::fs::read_to_string(path).map_err(|err| {
                error!(error = err.to_string(), path = %path, "failure to read ca chain");
                AmqpError::ConnectionError(format!("unreadable ca chain `{}`", path))
            })?;
            tls.cert_chain = Some(chain);
        }

        Ok(tls)
    }
}

#[async_trait]
impl ConnectionFactory for AmqpConnectionFactory {
    async fn connect(&self) -> Result<AmqpSession, AmqpError> {
        debug!("creating amqp connection...");
        let name = format!("{}-{}", self.app_name, Uuid::new_v4());
        let options = ConnectionProperties::default().with_connection_name(LongString::from(name));

        let uri = self.cfg.uri();
        let timeout = Duration::from_millis(self.cfg.connect_timeout_ms);

        let connecting = async {
            if self.cfg.tls.enabled {
                Connection::connect_with_config(&uri, options, self.tls_config()?)
                    .await
                    .map_err(|err| AmqpError::ConnectionError(err.to_string()))
            } else {
                Connection::connect(&uri, options)
                    .await
                    .map_err(|err| AmqpError::ConnectionError(err.to_string()))
            }
        };

        let conn = match tokio::time::timeout(timeout, connecting).await {
            Ok(Ok(c)) => Ok(c),
            Ok(Err(err)) => {
                error!(error = err.to_string(), "failure to connect");
                Err(err)
            }
            Err(_) => {
                warn!(timeout_ms = self.cfg.connect_timeout_ms, "amqp connect timed out");
                Err(AmqpError::ConnectionTimeout(self.cfg.connect_timeout_ms))
            }
        }?;
        debug!("amqp connected");

        debug!("creating amqp channel...");
        match conn.create_channel().await {
            Ok(c) => {
                debug!("channel created");
                Ok(AmqpSession {
                    connection: Arc::new(conn),
                    channel: Arc::new(c),
                })
            }
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                if let Err(err) = conn.close(REPLY_SUCCESS, "bye").await {
                    debug!(error = err.to_string(), "failure to close the connection");
                }
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::TlsConfigs;
    use std::time::Instant;

    #[tokio::test]
    async fn unreachable_broker_fails_within_timeout() {
        // 192.0.2.0/24 is reserved for documentation and never routed
        let cfg = RabbitMQConfigs {
            host: "192.0.2.1".to_owned(),
            connect_timeout_ms: 300,
            ..RabbitMQConfigs::default()
        };
        let factory = AmqpConnectionFactory::new("test", &cfg);

        let started = Instant::now();
        let result = factory.connect().await;

        assert!(result.is_err());
        assert!(result.err().is_some_and(|e| e.is_connectivity()));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn missing_ca_chain_is_a_connection_error() {
        let cfg = RabbitMQConfigs {
            tls: TlsConfigs {
                enabled: true,
                ca_cert_path: Some("/nonexistent/ca.pem".to_owned()),
            },
            ..RabbitMQConfigs::default()
        };
        let factory = AmqpConnectionFactory::new("test", &cfg);

        let result = factory.tls_config();

        assert!(matches!(result, Err(AmqpError::ConnectionError(_))));
    }
}
