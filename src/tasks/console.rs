use crate::commands::{self, OperatorCommand};
use crate::event::BotEvent;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Reads operator commands from stdin and forwards them to the event loop.
pub async fn read_console(events: mpsc::Sender<BotEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                // Running without a terminal: chat keeps working, only the console is gone
                info!("Console input closed");
                break;
            }
            Err(e) => {
                error!("Failed to read console input: {}", e);
                break;
            }
        };

        match commands::parse(&line) {
            Ok(Some(command)) => {
                let quit = command == OperatorCommand::Quit;
                if events.send(BotEvent::Operator(command)).await.is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }
}
