//! Chat Stream - interactive terminal client

use anyhow::Result;
use chat_stream::{
    events::ChatUpdate, ChatClient, Config, CredentialSource, EnvCredential, Message, SendOutcome,
    Sender, StaticCredential, WsConnector,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chat-stream")]
#[command(about = "Streaming chat client for the assistant socket")]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Full chat socket URL, overrides config
    #[arg(long, conflicts_with = "host")]
    url: Option<String>,

    /// Assistant host; the socket path is appended
    #[arg(long)]
    host: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "CHAT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so the conversation stays readable on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chat_stream=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.url = url;
    } else if let Some(host) = cli.host.as_deref() {
        config.url = Config::stream_url_for_host(host);
    }
    config.validate()?;

    let credentials: Arc<dyn CredentialSource> = match cli.token {
        Some(token) => Arc::new(StaticCredential::new(token)),
        None => Arc::new(EnvCredential::default()),
    };

    tracing::info!(url = %config.url, "Starting chat client");
    let client = ChatClient::new(&config, Arc::new(WsConnector), credentials);
    let updates = client.subscribe();
    let printer = tokio::spawn(print_updates(updates));

    client.connect()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim() == "/quit" {
            break;
        }
        match client.send_user_message(&line) {
            Ok(SendOutcome::Fallback) => {
                tracing::debug!("Message answered offline");
            }
            Ok(_) => {}
            Err(e) => eprintln!("! {e}"),
        }
    }

    client.teardown();
    drop(client);
    // let the printer flush the final status line
    if tokio::time::timeout(Duration::from_millis(250), printer)
        .await
        .is_err()
    {
        tracing::debug!("Update printer still running at exit");
    }
    Ok(())
}

async fn print_updates(mut updates: tokio::sync::broadcast::Receiver<ChatUpdate>) {
    loop {
        match updates.recv().await {
            Ok(ChatUpdate::Message { message }) => print_message(&message),
            Ok(ChatUpdate::Status { state }) => println!("-- {state}"),
            Ok(ChatUpdate::ConversationChanged { conversation_id }) => {
                println!("-- conversation {conversation_id}")
            }
            Ok(ChatUpdate::ReconnectExhausted { attempts }) => {
                println!("-- gave up reconnecting after {attempts} attempts")
            }
            Ok(ChatUpdate::TurnUpdated { .. }) => {}
            Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "Update printer lagged"),
            Err(RecvError::Closed) => return,
        }
    }
}

fn print_message(message: &Message) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    if let Some(component) = &message.attached_component {
        println!("{who} [{}] {}", component.name, component.args);
    }
    if !message.text.is_empty() {
        println!("{who}: {}", message.text);
    }
}
