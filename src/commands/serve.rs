//! `slack-relay serve`: run the connector behind a local webhook server.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use clap::ArgMatches;
use slack_connector::SlackConnector;

use crate::host::LocalHost;

pub async fn run(matches: &ArgMatches) {
    super::init_tracing();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .expect("config argument is required");
    let host = matches
        .get_one::<String>("host")
        .expect("host has a default");
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .expect("port has a default");

    let config = match super::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let connector = match SlackConnector::new(config) {
        Ok(connector) => connector,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let local = Arc::new(LocalHost::new());
    if !connector.connect(local.as_ref(), local.clone()).await {
        tracing::warn!("Serving without the Slack webhook route");
    }

    let app = local.router().route("/health", get(|| async { "ok" }));

    let addr = format!("{}:{}", host, port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error: cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        addr = %addr,
        path = connector.webhook_path(),
        "slack-relay listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    if let Err(e) = served {
        tracing::error!("Webhook server error: {}", e);
    }

    connector.disconnect().await;
    tracing::info!(forwarded = local.forwarded(), "slack-relay stopped");
}
