//! `slack-relay send`: post one message and print Slack's response.

use std::path::PathBuf;

use clap::ArgMatches;
use slack_connector::{DomainEvent, LinkedEvent, SlackConnector};

pub async fn run(matches: &ArgMatches) {
    super::init_tracing();

    let config_path = matches
        .get_one::<PathBuf>("config")
        .expect("config argument is required");
    let channel = matches
        .get_one::<String>("channel")
        .expect("channel argument is required");
    let text = matches
        .get_one::<String>("text")
        .expect("text argument is required");

    let built = super::load_config(config_path)
        .and_then(|config| SlackConnector::new(config).map_err(|e| e.to_string()));
    let connector = match built {
        Ok(connector) => connector,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let mut event = DomainEvent::message(text.as_str()).to(channel.as_str());
    if let Some(thread) = matches.get_one::<String>("thread") {
        // A reply inside an existing thread: the linked message is not the root.
        let raw = serde_json::json!({ "thread_ts": thread });
        event = event.linked_to(LinkedEvent::default().with_raw(raw));
    }

    match connector.send(&event).await {
        Ok(resp) => match serde_json::to_string_pretty(&resp) {
            Ok(body) => println!("{}", body),
            Err(_) => println!("{:?}", resp),
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
