//! Parsing of interactive input lines.

use std::path::PathBuf;

use docent_rig::rag::ChunkKind;

/// Help text listing every command.
pub const HELP: &str = "\
Commands:
  /add_text <path> [kind]  - Index a text file (kind: pdf, website, text, other)
  /stats                   - Show knowledge base statistics
  /list                    - List indexed chunks by source
  /debug <query>           - Show similarity scores for a query
  /delete <id>             - Delete one chunk
  /delete_source <kind>    - Delete every chunk of a source type
  /clear                   - Delete every chunk
  /stream                  - Toggle streamed answers
  /help                    - Show this help
  /quit                    - Exit

Just type your question to chat!";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Index a text file.
    AddText { path: PathBuf, kind: ChunkKind },
    Stats,
    List,
    /// Similarity report for a query, without answering.
    Debug(String),
    Delete(String),
    DeleteSource(String),
    Clear,
    ToggleStream,
    Help,
    Quit,
    /// A question for the knowledge base.
    Ask(String),
    /// A blank line.
    Empty,
    /// A malformed command, with the message to show.
    Invalid(String),
}

impl Command {
    /// Parses one input line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Ask(line.to_string());
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "/quit" | "/exit" => Self::Quit,
            "/help" => Self::Help,
            "/stats" => Self::Stats,
            "/list" => Self::List,
            "/clear" => Self::Clear,
            "/stream" => Self::ToggleStream,
            "/debug" => required(rest, "Please provide a query after /debug", Self::Debug),
            "/delete" => required(rest, "Please provide a chunk ID after /delete", Self::Delete),
            "/delete_source" => required(
                rest,
                "Please provide a source type after /delete_source",
                Self::DeleteSource,
            ),
            "/add_text" => parse_add_text(rest),
            _ => Self::Invalid(format!("Unknown command {name}. Use /help to list commands")),
        }
    }
}

fn required(rest: &str, message: &str, command: fn(String) -> Command) -> Command {
    if rest.is_empty() {
        Command::Invalid(message.to_string())
    } else {
        command(rest.to_string())
    }
}

/// `<path> [kind]`, where a trailing word that names a kind is the kind.
fn parse_add_text(rest: &str) -> Command {
    if rest.is_empty() {
        return Command::Invalid("Please provide a file path after /add_text".to_string());
    }

    if let Some((path, kind)) = rest.rsplit_once(char::is_whitespace)
        && let Ok(kind) = kind.parse::<ChunkKind>()
    {
        return Command::AddText {
            path: PathBuf::from(path.trim()),
            kind,
        };
    }

    Command::AddText {
        path: PathBuf::from(rest),
        kind: ChunkKind::Text,
    }
}
