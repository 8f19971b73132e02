// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use clap::Parser;
use std::process::ExitCode;
use topic_pubsub::{
    channel::AmqpConnectionFactory, configs::Configs, logging, publisher::TopicPublisher,
    settings::Settings, signals,
};
use tracing::{error, info};

/// Publishes timestamped messages to a topic exchange.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// Send this single message and exit instead of running the publishing loop
    #[arg(short, long)]
    message: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

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
    let publisher = TopicPublisher::new(factory, Settings::resolve(&cfg.messaging));

    if let Some(message) = cli.message {
        return if publisher.send(Some(&message)).await {
            info!("message sent");
            ExitCode::SUCCESS
        } else {
            error!("message not sent");
            ExitCode::FAILURE
        };
    }

    info!("Process started");
    match publisher.run(signals::shutdown_token()).await {
        Ok(()) => {
            info!("Process Stopped");
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
