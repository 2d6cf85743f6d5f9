//! Interactive line-based control of a [ClientPool]. Parsing is separate from dispatch so the
//!  command grammar can be tested without sockets.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use crate::client::client_pool::ClientPool;

pub const SEND_USAGE: &str = "send <client_num> <message>";
pub const BROADCAST_USAGE: &str = "broadcast <message>";

const HELP_TEXT: &str = "\
Available commands:
  help                          show this help
  list                          list active clients
  send <client_num> <message>   send a message from one client
  broadcast <message>           send a message from all clients
  exit                          stop all clients and exit";

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConsoleCommand {
    Help,
    List,
    Send { client_num: usize, message: String },
    Broadcast(String),
    Exit,
    /// a known command with malformed arguments, carrying the command's usage
    Invalid(&'static str),
    Unknown(String),
    Empty,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> ConsoleCommand {
        let line = line.trim_end_matches(['\r', '\n']);

        match line.split_once(' ') {
            None => match line {
                "" => ConsoleCommand::Empty,
                "help" => ConsoleCommand::Help,
                "list" => ConsoleCommand::List,
                "exit" => ConsoleCommand::Exit,
                "send" => ConsoleCommand::Invalid(SEND_USAGE),
                "broadcast" => ConsoleCommand::Invalid(BROADCAST_USAGE),
                other => ConsoleCommand::Unknown(other.to_string()),
            },
            Some(("send", args)) => Self::parse_send(args),
            Some(("broadcast", message)) => {
                if message.is_empty() {
                    ConsoleCommand::Invalid(BROADCAST_USAGE)
                }
                else {
                    ConsoleCommand::Broadcast(message.to_string())
                }
            }
            Some(_) => ConsoleCommand::Unknown(line.to_string()),
        }
    }

    /// `<client_num> <message>`, separated by exactly one space; the message is taken verbatim
    fn parse_send(args: &str) -> ConsoleCommand {
        let Some((client_num, message)) = args.split_once(' ') else {
            return ConsoleCommand::Invalid(SEND_USAGE);
        };
        match client_num.parse::<usize>() {
            Ok(client_num) if !message.is_empty() => ConsoleCommand::Send { client_num, message: message.to_string() },
            _ => ConsoleCommand::Invalid(SEND_USAGE),
        }
    }
}

/// Reads commands from `input` until `exit` or end of input, writing responses to `output`.
///  Either way, all clients in the pool are stopped before this returns.
pub async fn run_console(pool: &ClientPool, input: impl AsyncBufRead + Unpin, mut output: impl AsyncWrite + Unpin) -> anyhow::Result<()> {
    output.write_all(b"Type 'help' for available commands\n").await?;
    output.flush().await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = ConsoleCommand::parse(&line);
        debug!("console command: {:?}", command);

        let response = match command {
            ConsoleCommand::Empty => continue,
            ConsoleCommand::Help => HELP_TEXT.to_string(),
            ConsoleCommand::List => {
                let clients = pool.list().await;
                if clients.is_empty() {
                    "no active clients".to_string()
                }
                else {
                    clients.join("\n")
                }
            }
            ConsoleCommand::Send { client_num, message } => match pool.send(client_num, &message).await {
                Ok(_) => format!("sent from client_{}", client_num),
                Err(e) => format!("error: {}", e),
            },
            ConsoleCommand::Broadcast(message) => {
                let num_sent = pool.broadcast(&message).await;
                format!("broadcast from {} clients", num_sent)
            }
            ConsoleCommand::Exit => break,
            ConsoleCommand::Invalid(usage) => format!("usage: {}", usage),
            ConsoleCommand::Unknown(_) => "unknown command - type 'help' for available commands".to_string(),
        };

        output.write_all(response.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }

    pool.shutdown().await;
    Ok(())
}
