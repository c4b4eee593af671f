/// Slash commands routed to dedicated handlers instead of the completion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    History,
    Clear,
    Stats,
    Model,
    Lang,
}

impl Command {
    pub fn all() -> &'static [Command] {
        &[
            Command::Start,
            Command::Help,
            Command::History,
            Command::Clear,
            Command::Stats,
            Command::Model,
            Command::Lang,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "/start",
            Command::Help => "/help",
            Command::History => "/history",
            Command::Clear => "/clear",
            Command::Stats => "/stats",
            Command::Model => "/model",
            Command::Lang => "/lang",
        }
    }
}

/// Result of looking at an inbound text for a command token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Command(Command),
    /// Starts with `/` but names no known command.
    Unknown(String),
    /// Not a command - treat as a question.
    NotACommand,
}

/// Route `input` to a command. Only the first word counts, and a
/// `@botname` suffix on it is ignored (`/help@tilbot`).
pub fn parse_command(input: &str) -> CommandResult {
    let input = input.trim();
    if !input.starts_with('/') {
        return CommandResult::NotACommand;
    }

    let token = input.split_whitespace().next().unwrap_or(input);
    let cmd = token.split('@').next().unwrap_or(token);

    match cmd {
        "/start" => CommandResult::Command(Command::Start),
        "/help" => CommandResult::Command(Command::Help),
        "/history" => CommandResult::Command(Command::History),
        "/clear" => CommandResult::Command(Command::Clear),
        "/stats" => CommandResult::Command(Command::Stats),
        "/model" => CommandResult::Command(Command::Model),
        "/lang" => CommandResult::Command(Command::Lang),
        _ => CommandResult::Unknown(cmd.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_round_trips_through_its_name() {
        for command in Command::all() {
            assert_eq!(parse_command(command.name()), CommandResult::Command(*command));
        }
    }

    #[test]
    fn test_bot_suffix_and_arguments_are_ignored() {
        assert_eq!(parse_command("/help@tilbot"), CommandResult::Command(Command::Help));
        assert_eq!(parse_command("/stats please"), CommandResult::Command(Command::Stats));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(parse_command("/weather"), CommandResult::Unknown("/weather".into()));
        assert_eq!(parse_command("/"), CommandResult::Unknown("/".into()));
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(parse_command("Привет"), CommandResult::NotACommand);
        assert_eq!(parse_command("a/b"), CommandResult::NotACommand);
    }
}
