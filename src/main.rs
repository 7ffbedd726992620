//! CLI for ShardSub
//!
//! Subcommands:
//! - `server`: run the broker and its WebSocket ingress server
//! - `send`: submit a single record to a running server

use clap::{Parser, Subcommand};
use shardsub::broker::{Broker, HttpDeliverer, IngressRecord};
use shardsub::client::Client;
use shardsub::config::load_config;
use shardsub::persistence::SledStore;
use shardsub::transport::start_websocket_server;
use shardsub::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "shardsub")]
struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker and the WebSocket ingress server
    Server,
    /// Send one record to a running server and print the acknowledgement
    Send {
        /// WebSocket server URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
        /// Create, Sub, Unsub or Pub
        #[arg(long)]
        action: String,
        #[arg(long)]
        topic: String,
        /// Callback address for Sub/Unsub, originator for Pub
        #[arg(long, default_value = "")]
        sender: String,
        #[arg(long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let result = match cli.command {
        Command::Server => run_server().await,
        Command::Send {
            url,
            action,
            topic,
            sender,
            body,
        } => run_send(&url, IngressRecord::new(&action, &topic, &sender, &body)).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = load_config()?;
    let addr = config.addr();

    let deliverer = HttpDeliverer::new();
    let broker = if config.persistence.enabled {
        let store = SledStore::open(&config.persistence.path)?;
        Broker::start_with_persistence(&config, deliverer, store)?
    } else {
        Broker::start(&config, deliverer)?
    };

    let outcome = tokio::select! {
        result = start_websocket_server(&addr, broker.router()) => {
            result.map_err(|e| format!("ingress server on {addr} failed: {e}"))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            Ok(())
        }
    };

    broker.shutdown().await;
    Ok(outcome?)
}

async fn run_send(url: &str, record: IngressRecord) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::connect(url).await?;
    let reply = client.send(&record).await?;
    println!("{}", serde_json::to_string(&reply)?);
    client.close().await?;
    Ok(())
}
