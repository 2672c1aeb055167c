mod bot;
mod commands;
mod config;
mod error;
mod event;
mod handlers;
mod models;
mod report;
mod tasks;
mod twitch;
mod voting;

use bot::VoteBot;
use config::Config;
use event::BotEvent;
use handlers::Flow;
use log::{error, info};
use std::time::Duration;
use tokio::sync::mpsc;
use twitch::auth::TwitchAuth;
use twitch::helix::{self, HelixClient};

const EVENT_BUFFER: usize = 256;
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    // Sign in
    let auth = TwitchAuth::new(&config.client_id, config.client_secret.as_deref());
    let session = match auth.resolve(&config).await {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Logged in as {} for #{}", session.login, config.channel);

    // Subscriber tiers are fetched once; failures leave the table empty
    let helix = HelixClient::new(&config.client_id, &session.tokens.access_token);
    let subscriptions = helix::load_subscriptions(&helix, &config.channel).await;

    let (event_tx, mut event_rx) = mpsc::channel::<BotEvent>(EVENT_BUFFER);

    let chat = match twitch::chat::connect(
        &session.login,
        &session.tokens.access_token,
        &config.channel,
        event_tx.clone(),
    )
    .await
    {
        Ok(chat) => chat,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut bot = VoteBot::new(chat, &config).with_ticks(event_tx.clone());
    bot.set_subscriptions(subscriptions);

    // --- Background tasks ---
    tokio::spawn(tasks::console::read_console(event_tx.clone()));
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(BotEvent::Shutdown).await;
            }
        });
    }
    drop(event_tx);

    // --- Event loop ---
    while let Some(event) = event_rx.recv().await {
        if handlers::handle_event(&mut bot, event).await == Flow::Exit {
            break;
        }
    }

    // Give the chat writer a moment to send the last announcements
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    info!("Bye");
}
