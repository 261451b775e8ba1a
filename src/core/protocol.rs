//! The line protocol spoken on stdin/stdout in serve mode.
//!
//! ```text
//! list-all          → listing / <id>:<label>... / (blank line)
//! find:<id>         → package:<id>:<label> | error:not-found:<id>
//! exit              → (nothing, session ends)
//! <anything else>   → error:unknown-command:<line>
//! (timer)           → ping:<n>
//! ```


use super::registry::ApplicationRecord;

pub const LIST_ALL: &str = "list-all";
pub const EXIT: &str = "exit";
pub const FIND_PREFIX: &str = "find:";

pub const LISTING_HEADER: &str = "listing";
pub const PACKAGE_PREFIX: &str = "package:";
pub const NOT_FOUND_PREFIX: &str = "error:not-found:";
pub const UNKNOWN_COMMAND_PREFIX: &str = "error:unknown-command:";
pub const PING_PREFIX: &str = "ping:";

// ───────────────────────────────────────── commands ──────────

/// One input line, already stripped of its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListAll,
    /// Look up a single identifier.  May be empty.
    Find(String),
    Exit,
    /// Anything else, kept verbatim for the error reply.
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line {
            LIST_ALL => Command::ListAll,
            EXIT => Command::Exit,
            _ => match line.strip_prefix(FIND_PREFIX) {
                Some(id) => Command::Find(id.to_string()),
                None => Command::Unknown(line.to_string()),
            },
        }
    }
}

// ───────────────────────────────────────── responses ─────────

/// A complete reply.  Each one is written under the output lock as a single
/// block, so its lines never interleave with another writer's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Listing(Vec<ApplicationRecord>),
    Package { identifier: String, label: String },
    NotFound(String),
    UnknownCommand(String),
    Ping(u64),
}

impl Response {
    /// Exact bytes for this reply, trailing newline(s) included.
    pub fn render(&self) -> String {
        match self {
            Response::Listing(records) => {
                let mut out = String::with_capacity(16 + records.len() * 48);
                out.push_str(LISTING_HEADER);
                out.push('\n');
                for record in records {
                    out.push_str(&entry_line(record));
                    out.push('\n');
                }
                out.push('\n');
                out
            }
            Response::Package { identifier, label } => {
                format!("{PACKAGE_PREFIX}{identifier}:{label}\n")
            }
            Response::NotFound(identifier) => format!("{NOT_FOUND_PREFIX}{identifier}\n"),
            Response::UnknownCommand(line) => format!("{UNKNOWN_COMMAND_PREFIX}{line}\n"),
            Response::Ping(n) => format!("{PING_PREFIX}{n}\n"),
        }
    }
}

/// `<identifier>:<label>`, the per-application line shared by the serve-mode
/// listing and the single-shot `--list-all` output.
pub fn entry_line(record: &ApplicationRecord) -> String {
    format!("{}:{}", record.identifier, record.label)
}

// ───────────────────────────────────────── controller side ───
