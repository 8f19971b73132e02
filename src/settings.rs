// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messaging Settings
//!
//! Resolves the messaging keys of the configuration into the values both roles run
//! with. Resolution never fails: a missing or empty string, or a non-positive
//! interval, falls back to its default. Anything else, including routing patterns
//! the broker would not understand, is passed through unchanged.

use crate::{configs::MessagingConfigs, topology::TopicTopology};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_EXCHANGE_NAME: &str = "EXCHANGE3";
pub const DEFAULT_QUEUE_NAME: &str = "rabbit-queue";
pub const DEFAULT_ROUTING_KEY: &str = "rabbit-test";
pub const DEFAULT_MESSAGE_INTERVAL_MS: u64 = 5000;

/// How the subscriber turns a payload into text.
///
/// The publisher always writes UTF-8. `Ascii` replaces every byte outside the
/// 7-bit range with `?`, so non-ASCII payloads do not survive the trip unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    #[default]
    Ascii,
    Utf8,
}

impl PayloadEncoding {
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            PayloadEncoding::Ascii => data
                .iter()
                .map(|b| if b.is_ascii() { *b as char } else { '?' })
                .collect(),
            PayloadEncoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub exchange_name: String,
    pub queue_name: String,
    pub routing_key: String,
    pub send_interval: Duration,
    pub payload_encoding: PayloadEncoding,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::resolve(&MessagingConfigs::default())
    }
}

impl Settings {
    pub fn resolve(cfg: &MessagingConfigs) -> Settings {
        let interval = match cfg.message_interval {
            Some(ms) if ms > 0 => ms as u64,
            _ => DEFAULT_MESSAGE_INTERVAL_MS,
        };

        Settings {
            exchange_name: or_default(&cfg.exchange_name, DEFAULT_EXCHANGE_NAME),
            queue_name: or_default(&cfg.queue_name, DEFAULT_QUEUE_NAME),
            routing_key: or_default(&cfg.routing_key, DEFAULT_ROUTING_KEY),
            send_interval: Duration::from_millis(interval),
            payload_encoding: cfg.payload_encoding.unwrap_or_default(),
        }
    }

    pub fn topology(&self) -> TopicTopology {
        TopicTopology {
            exchange_name: self.exchange_name.clone(),
            queue_name: self.queue_name.clone(),
            routing_key: self.routing_key.clone(),
        }
    }
}

fn or_default(value: &Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.clone(),
        _ => default.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_interval(ms: Option<i64>) -> MessagingConfigs {
        MessagingConfigs {
            message_interval: ms,
            ..MessagingConfigs::default()
        }
    }

    #[test]
    fn absent_values_resolve_to_defaults() {
        let settings = Settings::resolve(&MessagingConfigs::default());

        assert_eq!(settings.exchange_name, "EXCHANGE3");
        assert_eq!(settings.queue_name, "rabbit-queue");
        assert_eq!(settings.routing_key, "rabbit-test");
        assert_eq!(settings.send_interval, Duration::from_millis(5000));
        assert_eq!(settings.payload_encoding, PayloadEncoding::Ascii);
    }

    #[test]
    fn empty_strings_resolve_to_defaults() {
        let cfg = MessagingConfigs {
            exchange_name: Some(String::new()),
            queue_name: Some(String::new()),
            routing_key: Some(String::new()),
            ..MessagingConfigs::default()
        };

        let settings = Settings::resolve(&cfg);

        assert_eq!(settings.exchange_name, "EXCHANGE3");
        assert_eq!(settings.queue_name, "rabbit-queue");
        assert_eq!(settings.routing_key, "rabbit-test");
    }

    #[test]
    fn non_positive_interval_resolves_to_default() {
        for ms in [Some(0), Some(-3), None] {
            let settings = Settings::resolve(&with_interval(ms));
            assert_eq!(settings.send_interval, Duration::from_millis(5000));
        }
    }

    #[test]
    fn provided_values_pass_through() {
        let cfg = MessagingConfigs {
            exchange_name: Some("orders".to_owned()),
            queue_name: Some("orders-audit".to_owned()),
            routing_key: Some("orders.*.#..".to_owned()),
            message_interval: Some(1200),
            payload_encoding: Some(PayloadEncoding::Utf8),
        };

        let settings = Settings::resolve(&cfg);

        assert_eq!(settings.exchange_name, "orders");
        assert_eq!(settings.queue_name, "orders-audit");
        assert_eq!(settings.routing_key, "orders.*.#..");
        assert_eq!(settings.send_interval, Duration::from_millis(1200));
        assert_eq!(settings.payload_encoding, PayloadEncoding::Utf8);
    }

    #[test]
    fn ascii_decoding_masks_non_ascii_bytes() {
        let data = "héllo".as_bytes();

        assert_eq!(PayloadEncoding::Ascii.decode(b"hello"), "hello");
        assert_eq!(PayloadEncoding::Ascii.decode(data), "h??llo");
        assert_eq!(PayloadEncoding::Utf8.decode(data), "héllo");
    }

    #[test]
    fn topology_mirrors_settings() {
        let topology = Settings::default().topology();

        assert_eq!(topology.exchange_name, "EXCHANGE3");
        assert_eq!(topology.queue_name, "rabbit-queue");
        assert_eq!(topology.routing_key, "rabbit-test");
    }
}
