//! Postdrop - mail receiver entry point

use anyhow::Result;
use postdrop_common::config::{Config, LoggingConfig};
use postdrop_core::{
    AllowedDomains, AuthPipeline, DnsClient, MailDrop, SessionEngine, SmtpServer,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting Postdrop mail receiver on {}...", config.server.hostname);

    // Initialize the DNS resolver and the authentication pipeline
    let resolver = Arc::new(DnsClient::new(&config.dns));
    let pipeline = Arc::new(AuthPipeline::new(resolver));

    // Initialize the spool
    let maildrop = Arc::new(MailDrop::new(config.delivery.spool_dir.clone(), pipeline));
    info!(
        "Spooling accepted messages to {}",
        config.delivery.spool_dir.display()
    );

    // Initialize the session engine
    let mut engine = SessionEngine::new(maildrop);
    if !config.smtp.allowed_domains.is_empty() {
        info!(
            "Accepting recipients for: {}",
            config.smtp.allowed_domains.join(", ")
        );
        let validator = AllowedDomains::new(config.smtp.allowed_domains.clone());
        engine = engine.with_validator(Arc::new(validator));
    }

    // Start SMTP server
    let smtp_server = Arc::new(SmtpServer::new(config.smtp.clone(), Arc::new(engine)));
    let smtp_handle = {
        let smtp_server = smtp_server.clone();
        tokio::spawn(async move {
            if let Err(e) = smtp_server.run().await {
                tracing::error!("SMTP server error: {}", e);
            }
        })
    };

    info!("Postdrop started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    smtp_handle.abort();

    info!("Postdrop shutdown complete");

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},postdrop=debug", config.level)));

    if config.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_level(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
