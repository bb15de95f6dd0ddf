mod backend;
mod chat;
mod client;
mod common;
mod config;
mod gateway;
mod storage;
mod ui;

use std::error::Error;
use std::sync::Arc;

use backend::Backend;
use chat::{ChannelService, LogSink, MessagePipeline, NotificationDispatcher, SubscriptionUpdate};
use clap::{Args, Parser, Subcommand};
use client::ChatClient;
use dotenvy::dotenv;
use tokio::sync::mpsc;
use ui::ChatApp;

#[derive(Parser)]
#[command(
    name = "chat",
    version,
    about = "Channel chat client with live message streams and topic push"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Open the desktop client (default)
    Ui,
    /// Write the effective configuration to the config file
    InitConfig,
    /// List channels
    Channels {
        #[command(flatten)]
        login: Login,
    },
    /// Print a channel's messages every time they change, until Ctrl-C
    Tail {
        channel: String,
        #[command(flatten)]
        login: Login,
    },
    /// Send one text message to a channel
    Send {
        channel: String,
        text: String,
        #[command(flatten)]
        login: Login,
    },
}

#[derive(Args)]
struct Login {
    #[arg(long, env = "CHAT_EMAIL")]
    email: String,
    #[arg(long, env = "CHAT_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);

    if let Some(Mode::InitConfig) = cli.mode {
        config::save_config(&cli.config, &app_config)?;
        println!("Wrote {}", cli.config);
        return Ok(());
    }

    let backend = backend::open(&app_config.backend)?;

    match cli.mode {
        None | Some(Mode::Ui) => run_ui(backend)?,
        Some(Mode::Channels { login }) => {
            sign_in(&backend, &login).await?;
            for channel in ChannelService::new(backend.channels.clone()).list().await? {
                println!("{}\t{}", channel.id, channel.name);
            }
        }
        Some(Mode::Tail { channel, login }) => {
            sign_in(&backend, &login).await?;
            tail(&backend, &channel).await?;
        }
        Some(Mode::Send {
            channel,
            text,
            login,
        }) => {
            sign_in(&backend, &login).await?;
            let sent = pipeline(&backend).send(&channel, Some(text), None).await?;
            println!("Sent {}", sent.message.id);
            sent.delivered().await;
        }
        Some(Mode::InitConfig) => {}
    }

    Ok(())
}

async fn sign_in(backend: &Backend, login: &Login) -> Result<(), Box<dyn Error>> {
    let user = backend.session.sign_in(&login.email, &login.password).await?;
    log::info!("Signed in as {}", user.display_name);
    Ok(())
}

fn pipeline(backend: &Backend) -> MessagePipeline {
    let notifier = NotificationDispatcher::new(
        backend.push.clone(),
        backend.session.clone(),
        Arc::new(LogSink),
    );
    MessagePipeline::new(
        backend.messages.clone(),
        backend.media.clone(),
        backend.session.clone(),
        notifier,
    )
}

async fn tail(backend: &Backend, channel: &str) -> Result<(), Box<dyn Error>> {
    let mut subscription = pipeline(backend).subscribe(channel).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = subscription.next() => match update {
                Some(SubscriptionUpdate::Messages(messages)) => {
                    println!("--- {channel}: {} messages", messages.len());
                    for message in &messages {
                        let body = match (message.text(), message.image()) {
                            (Some(text), _) => text,
                            (None, Some(url)) => url,
                            (None, None) => ui::components::chat_area::EMPTY_PLACEHOLDER,
                        };
                        println!("[{}] {}: {body}", message.create_at, message.sender_name);
                    }
                }
                Some(SubscriptionUpdate::Failed(err)) => {
                    log::error!("Listener on {channel} failed: {err}");
                }
                None => break,
            },
        }
    }

    subscription.cancel().await;
    Ok(())
}

fn run_ui(backend: Backend) -> Result<(), eframe::Error> {
    // UI -> client loop
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // client loop -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let user = backend.session.current_user();
    tokio::spawn(ChatClient::new(backend, event_tx, cmd_rx).run());

    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);

    eframe::run_native(
        "Channel Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");
            Ok(Box::new(ChatApp::new(cc, user.clone(), cmd_tx.clone(), event_receiver)))
        }),
    )
}
