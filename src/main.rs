#![allow(clippy::multiple_crate_versions)]

mod commands;
mod host;

use std::path::PathBuf;

use clap::{value_parser, Arg, Command};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("JSON connector configuration")
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

#[tokio::main]
async fn main() {
    let matches = Command::new("slack-relay")
        .version(VERSION)
        .about("Slack connector host: receive Slack webhooks and send Slack messages")
        .subcommand(
            Command::new("serve")
                .about("Connect to Slack and serve the webhook route")
                .arg(config_arg())
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("Host address to bind to")
                        .default_value("127.0.0.1"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Port to bind the webhook server to")
                        .value_parser(value_parser!(u16))
                        .default_value("3100"),
                ),
        )
        .subcommand(
            Command::new("send")
                .about("Post one message to a channel")
                .arg(config_arg())
                .arg(
                    Arg::new("channel")
                        .long("channel")
                        .value_name("CHANNEL")
                        .help("Channel id or #name")
                        .required(true),
                )
                .arg(
                    Arg::new("text")
                        .short('t')
                        .long("text")
                        .value_name("TEXT")
                        .help("Message text")
                        .required(true),
                )
                .arg(
                    Arg::new("thread")
                        .long("thread")
                        .value_name("TS")
                        .help("Reply inside the thread with this root ts"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => commands::serve::run(sub_matches).await,
        Some(("send", sub_matches)) => commands::send::run(sub_matches).await,
        _ => {
            println!("slack-relay v{}", VERSION);
            println!("Use --help for available commands");
        }
    }
}
