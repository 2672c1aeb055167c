use crate::config::parse_list;
use crate::error::BotError;

pub const HELP: &str = "\
Commands:
  start [CHOICES] [SECONDS]  start a vote, e.g. `start A,B,C 30` (defaults from config)
  stop                       stop the running vote and save results
  keywords K1,K2             set the chat keywords that join the queue
  queue                      show the queue
  remove USER                remove a viewer from the queue
  clear                      empty the queue
  results                    show the last round's results
  status                     show the current round and queue state
  help                       show this text
  quit                       disconnect and exit";

/// An instruction typed by the operator at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// `None` fields fall back to the configured defaults.
    Start {
        choices: Option<Vec<String>>,
        seconds: Option<u32>,
    },
    Stop,
    SetKeywords(Vec<String>),
    ShowQueue,
    Remove(String),
    ClearQueue,
    Results,
    Status,
    Help,
    Quit,
}

/// Parses one console line. Blank lines yield `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<OperatorCommand>, BotError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_lowercase().as_str() {
        "start" => parse_start(rest)?,
        "stop" => OperatorCommand::Stop,
        "keywords" => OperatorCommand::SetKeywords(parse_list(rest)),
        "queue" => OperatorCommand::ShowQueue,
        "remove" if !rest.is_empty() => OperatorCommand::Remove(rest.trim_start_matches('@').to_lowercase()),
        "remove" => return Err(BotError::InvalidCommand("usage: remove USER".to_string())),
        "clear" => OperatorCommand::ClearQueue,
        "results" => OperatorCommand::Results,
        "status" => OperatorCommand::Status,
        "help" | "?" => OperatorCommand::Help,
        "quit" | "exit" => OperatorCommand::Quit,
        other => {
            return Err(BotError::InvalidCommand(format!(
                "unknown command `{}`, type `help` for a list",
                other
            )));
        }
    };
    Ok(Some(command))
}

fn parse_start(rest: &str) -> Result<OperatorCommand, BotError> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let Some((last, before)) = tokens.split_last() else {
        return Ok(OperatorCommand::Start {
            choices: None,
            seconds: None,
        });
    };

    let (choice_tokens, seconds) = if last.chars().all(|c| c.is_ascii_digit()) {
        let seconds = last
            .parse::<u32>()
            .map_err(|_| BotError::InvalidCommand("Vote time must be an integer.".to_string()))?;
        (before, Some(seconds))
    } else if !before.is_empty() && !last.contains(',') && !before.last().is_some_and(|t| t.ends_with(',')) {
        // `start A,B soon`: a trailing word that isn't part of the choice list
        return Err(BotError::InvalidCommand("Vote time must be an integer.".to_string()));
    } else {
        (&tokens[..], None)
    };

    let choices = parse_list(&choice_tokens.join(" "));
    Ok(OperatorCommand::Start {
        choices: if choices.is_empty() { None } else { Some(choices) },
        seconds,
    })
}
