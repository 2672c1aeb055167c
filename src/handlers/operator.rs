use crate::bot::VoteBot;
use crate::commands::{HELP, OperatorCommand};
use crate::twitch::chat::ChatSink;
use crate::voting::plurality;
use log::{info, warn};

use super::Flow;

/// Runs one console command. Output goes to stdout for the operator.
pub async fn handle_operator<S: ChatSink>(bot: &mut VoteBot<S>, command: OperatorCommand) -> Flow {
    info!("Operator command: {:?}", command);

    match command {
        OperatorCommand::Start { choices, seconds } => match bot.start_vote(choices, seconds).await {
            Ok(_) => println!(
                "Vote started: {} for {}s",
                bot.round().choices().join(", "),
                bot.round().duration()
            ),
            Err(e) => println!("{}", e),
        },
        OperatorCommand::Stop => match bot.stop_vote().await {
            Ok(()) => print_results(bot),
            Err(e) => println!("{}", e),
        },
        OperatorCommand::SetKeywords(keywords) => {
            bot.set_queue_keywords(keywords);
            println!("Queue keywords have been set: {}", bot.queue_keywords().join(", "));
        }
        OperatorCommand::ShowQueue => print!("{}", with_newline(bot.queue_table())),
        OperatorCommand::Remove(user) => {
            if bot.remove_from_queue(&user) {
                println!("Removed {} from the queue", user);
                print!("{}", with_newline(bot.queue_table()));
            } else {
                warn!("Tried to remove {} who is not queued", user);
                println!("{} is not in the queue", user);
            }
        }
        OperatorCommand::ClearQueue => {
            bot.clear_queue();
            println!("Queue cleared");
        }
        OperatorCommand::Results => print_results(bot),
        OperatorCommand::Status => println!("{}", bot.status()),
        OperatorCommand::Help => println!("{}", HELP),
        OperatorCommand::Quit => return Flow::Exit,
    }
    Flow::Continue
}

/// Prints the last round's table and tally.
pub fn print_results<S: ChatSink>(bot: &VoteBot<S>) {
    println!("Vote results");
    print!("{}", bot.results_table());
    for count in bot.tally() {
        println!("  {}: {}", count.choice, count.votes);
    }
    println!("{}", plurality::summary_line(bot.last_results()));
}

fn with_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::bot_in;

    #[tokio::test]
    async fn start_stop_through_console() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, _sink) = bot_in(dir.path());

        let flow = handle_operator(
            &mut bot,
            OperatorCommand::Start {
                choices: Some(vec!["X".into(), "Y".into()]),
                seconds: Some(20),
            },
        )
        .await;
        assert_eq!(flow, Flow::Continue);
        assert!(bot.round().is_running());
        assert_eq!(bot.round().choices(), ["X", "Y"]);

        handle_operator(&mut bot, OperatorCommand::Stop).await;
        assert!(!bot.round().is_running());
        assert!(dir.path().join("results.txt").exists());
    }

    #[tokio::test]
    async fn keywords_and_queue_edits() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, _sink) = bot_in(dir.path());

        handle_operator(&mut bot, OperatorCommand::SetKeywords(vec!["PLAY".into()])).await;
        assert!(bot.is_queue_keyword("PLAY"));
        assert!(!bot.is_queue_keyword("!JOIN"));

        bot.join_queue("alice").await;
        bot.join_queue("bob").await;
        handle_operator(&mut bot, OperatorCommand::Remove("alice".into())).await;
        assert_eq!(bot.queue().entries(), ["bob"]);
        handle_operator(&mut bot, OperatorCommand::ClearQueue).await;
        assert!(bot.queue().is_empty());
    }

    #[tokio::test]
    async fn quit_exits() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, _sink) = bot_in(dir.path());
        assert_eq!(handle_operator(&mut bot, OperatorCommand::Quit).await, Flow::Exit);
    }
}
