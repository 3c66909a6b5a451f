//! Parses inbound text into bot commands or plain answers.

/// A slash command the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Greeting; no state.
    Start,
    /// Command list; no state.
    Help,
    /// Begin a new post conversation.
    Post,
    /// Abandon the post in progress.
    Cancel,
    /// Any other slash command (lowercased, without `/` or `@bot`).
    Unknown(String),
}

/// Inbound message, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    /// Anything that is not a command, passed through untouched.
    Text(String),
}

impl Input {
    /// Classify message content.
    ///
    /// Commands may carry Telegram's `@BotName` suffix and trailing
    /// arguments, which are ignored.
    pub fn parse(content: &str) -> Input {
        let trimmed = content.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Input::Text(content.to_string());
        };

        let word = rest.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("").to_lowercase();

        let command = match name.as_str() {
            "start" => Command::Start,
            "help" | "?" => Command::Help,
            "post" | "new" => Command::Post,
            "cancel" | "stop" => Command::Cancel,
            _ => Command::Unknown(name),
        };
        Input::Command(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_commands() {
        assert_eq!(Input::parse("/start"), Input::Command(Command::Start));
        assert_eq!(Input::parse("/help"), Input::Command(Command::Help));
        assert_eq!(Input::parse("/post"), Input::Command(Command::Post));
        assert_eq!(Input::parse("/cancel"), Input::Command(Command::Cancel));
    }

    #[test]
    fn commands_are_case_insensitive_and_trimmed() {
        assert_eq!(Input::parse("  /POST \n"), Input::Command(Command::Post));
        assert_eq!(Input::parse("/Cancel"), Input::Command(Command::Cancel));
    }

    #[test]
    fn bot_suffix_and_arguments_ignored() {
        assert_eq!(
            Input::parse("/post@EventPostBot"),
            Input::Command(Command::Post)
        );
        assert_eq!(
            Input::parse("/cancel@EventPostBot now please"),
            Input::Command(Command::Cancel)
        );
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            Input::parse("/undo"),
            Input::Command(Command::Unknown("undo".into()))
        );
        assert_eq!(Input::parse("/"), Input::Command(Command::Unknown(String::new())));
    }

    #[test]
    fn plain_text_passes_through_untouched() {
        assert_eq!(Input::parse("PolyNite"), Input::Text("PolyNite".into()));
        assert_eq!(Input::parse("12/11-16/12"), Input::Text("12/11-16/12".into()));
        assert_eq!(Input::parse(" Yes "), Input::Text(" Yes ".into()));
        assert_eq!(
            Input::parse("https://agepoly.ch"),
            Input::Text("https://agepoly.ch".into())
        );
    }
}
