// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Installs the global `tracing` subscriber for the binaries.
//!
//! `RUST_LOG` drives the filter (default `info`). Development environments get
//! human-readable output; everything else logs JSON.

use crate::configs::AppConfigs;
use tracing_subscriber::EnvFilter;

pub fn init(app: &AppConfigs) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    if app.is_development() {
        builder.with_target(true).with_line_number(true).init();
    } else {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .init();
    }
}
