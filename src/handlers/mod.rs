mod chat;
mod operator;

use crate::bot::VoteBot;
use crate::event::BotEvent;
use crate::twitch::chat::ChatSink;
use crate::voting::TickOutcome;
use log::{error, info, warn};

/// Whether the event loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Single entry point for every event the bot reacts to.
pub async fn handle_event<S: ChatSink>(bot: &mut VoteBot<S>, event: BotEvent) -> Flow {
    match event {
        BotEvent::Chat(msg) => {
            chat::handle_chat(bot, &msg).await;
            Flow::Continue
        }
        BotEvent::Joined(channel) => {
            bot.on_joined(&channel).await;
            println!("✅ Ready. Type `help` for commands.");
            Flow::Continue
        }
        BotEvent::Tick(round_id) => {
            if bot.tick(round_id).await == TickOutcome::Expired {
                operator::print_results(bot);
            }
            Flow::Continue
        }
        BotEvent::Operator(command) => {
            let flow = operator::handle_operator(bot, command).await;
            if flow == Flow::Exit {
                save_running_round(bot).await;
            }
            flow
        }
        BotEvent::ChatClosed => {
            error!("Chat connection closed");
            save_running_round(bot).await;
            Flow::Exit
        }
        BotEvent::Shutdown => {
            info!("Shutting down");
            save_running_round(bot).await;
            Flow::Exit
        }
    }
}

/// Votes only live in memory, so a running round is stopped and saved
/// before the process goes away.
async fn save_running_round<S: ChatSink>(bot: &mut VoteBot<S>) {
    if bot.round().is_running() {
        warn!("Stopping the running vote before exit");
        if let Err(e) = bot.stop_vote().await {
            error!("Failed to stop vote: {}", e);
        }
    }
}
