use crate::commands::OperatorCommand;
use crate::models::ChatMessage;

pub enum BotEvent {
    /// A viewer wrote in chat.
    Chat(ChatMessage),
    /// The server confirmed our JOIN; safe to talk in the channel.
    Joined(String),
    /// One second of the countdown for this round id elapsed.
    Tick(u64),
    /// A line typed at the operator console.
    Operator(OperatorCommand),
    /// The chat connection ended; nothing more will arrive from it.
    ChatClosed,
    /// Ctrl+C or `quit`.
    Shutdown,
}
