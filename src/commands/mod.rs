pub mod echo;
pub mod executable;
pub mod get;
pub mod ping;
pub mod set;

use std::vec;
use thiserror::Error as ThisError;
use tracing::debug;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::reply::Reply;
use crate::store::Store;

use echo::Echo;
use get::Get;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Echo(Echo),
    Get(Get),
    Ping(Ping),
    Set(Set),

    /// Any command name not listed above. It is answered like `PING` so that clients probing for
    /// commands this server does not know keep working.
    Unknown(String),
}

impl Executable for Command {
    fn exec(self, store: &Store) -> Reply {
        match self {
            Command::Echo(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
            Command::Unknown(name) => {
                debug!(command = %name, "Unknown command, replying PONG");
                Reply::pong()
            }
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let mut parts = frame.into_args().into_iter();

        let command_name = parts
            .next()
            .ok_or(CommandParserError::EmptyCommand)?
            .to_lowercase();

        let parser = &mut CommandParser {
            command: command_name.clone(),
            parts,
        };

        match &command_name[..] {
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "get" => Get::try_from(parser).map(Command::Get),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "set" => Set::try_from(parser).map(Command::Set),
            _ => Ok(Command::Unknown(parser.command.clone())),
        }
    }
}

/// Runs a single decoded frame against the store and produces the reply to send back.
///
/// Empty frames get no reply at all. Commands missing a required argument, which happens when a
/// client hangs up halfway through a command, are answered with an error reply.
pub fn dispatch(frame: Frame, store: &Store) -> Option<Reply> {
    if frame.is_empty() {
        return None;
    }

    let reply = match Command::try_from(frame) {
        Ok(cmd) => cmd.exec(store),
        Err(err) => Reply::Error(err.to_string()),
    };

    Some(reply)
}

pub(crate) struct CommandParser {
    command: String,
    parts: vec::IntoIter<String>,
}

impl CommandParser {
    fn next_string(&mut self) -> Result<String, CommandParserError> {
        self.parts
            .next()
            .ok_or_else(|| CommandParserError::WrongNumberOfArguments {
                command: self.command.clone(),
            })
    }

    fn next_optional(&mut self) -> Option<String> {
        self.parts.next()
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongNumberOfArguments { command: String },
    #[error("ERR empty command")]
    EmptyCommand,
}
