// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use std::process::ExitCode;
use topic_pubsub::{
    channel::AmqpConnectionFactory, configs::Configs, logging, settings::Settings, signals,
    subscriber::TopicSubscriber,
};
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    let cfg = match Configs::load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&cfg.app);
    info!(rabbitmq = ?cfg.rabbitmq, messaging = ?cfg.messaging, "configuration loaded");

    let factory = AmqpConnectionFactory::new(&cfg.app.name, &cfg.rabbitmq);
    let subscriber = TopicSubscriber::new(factory, Settings::resolve(&cfg.messaging));

    info!("Process started");
    match subscriber.run(signals::shutdown_token()).await {
        Ok(()) => {
            info!("Process Stopped");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
