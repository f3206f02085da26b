//! REPL input parsing.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: ask it.
    Ask(String),
    Games,
    Game(String),
    Edit { index: usize, text: String },
    Dismiss(usize),
    Clear,
    History,
    Open(usize),
    Close,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: /{0} (try /help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
/games               list known board games
/game <name>         select a game and load its history
/edit <n> <text>     replace message n and ask again
/dismiss <n>         remove error message n
/clear               clear the conversation
/history             print the conversation
/open <n>            open citation n of the last answer
/close               close the open document
/quit                exit
anything else        ask a question";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Ok(Command::Ask(line.to_string())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    Some(match name {
        "games" => Ok(Command::Games),
        "game" if !args.is_empty() => Ok(Command::Game(args.to_string())),
        "game" => Err(ParseError::Usage("/game <name>")),
        "edit" => parse_edit(args),
        "dismiss" => index(args)
            .map(Command::Dismiss)
            .ok_or(ParseError::Usage("/dismiss <n>")),
        "clear" => Ok(Command::Clear),
        "history" => Ok(Command::History),
        "open" => index(args)
            .map(Command::Open)
            .ok_or(ParseError::Usage("/open <n>")),
        "close" => Ok(Command::Close),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(ParseError::Unknown(other.to_string())),
    })
}

fn parse_edit(args: &str) -> Result<Command, ParseError> {
    const USAGE: ParseError = ParseError::Usage("/edit <n> <text>");
    let (number, text) = args.split_once(char::is_whitespace).ok_or(USAGE)?;
    let index = index(number).ok_or(USAGE)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(USAGE);
    }
    Ok(Command::Edit {
        index,
        text: text.to_string(),
    })
}

fn index(arg: &str) -> Option<usize> {
    arg.trim().parse().ok()
}
