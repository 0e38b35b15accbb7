//! Operator commands typed into the dashboard's input line.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Command words offered by autocompletion, in display order.
pub const COMMANDS: &[&str] = &[
    "scan", "connect", "forget", "start", "stop", "send", "shutdown", "dnd", "apps", "notify",
    "remove", "help",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCommand {
    /// Rescan the configured satellites.
    Scan,
    /// Connect to a candidate by list index or by address.
    Connect(String),
    /// Forget the remembered satellite and stop.
    Forget,
    Start,
    Stop,
    /// Send a file to the satellite.
    Send(PathBuf),
    Shutdown,
    Dnd(bool),
    /// Ask for the satellite's application list.
    Apps,
    /// Mirror a notification by hand.
    Notify {
        package: String,
        title: String,
        text: String,
    },
    /// Withdraw a mirrored notification by key.
    Remove(String),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandError(String);

impl fmt::Display for ParseCommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParseCommandError {}

fn usage(text: &str) -> ParseCommandError {
    ParseCommandError(format!("usage: {text}"))
}

impl FromStr for HubCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "scan" => Ok(Self::Scan),
            "connect" if !rest.is_empty() => Ok(Self::Connect(rest.to_string())),
            "connect" => Err(usage("connect <index|address>")),
            "forget" => Ok(Self::Forget),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "send" if !rest.is_empty() => Ok(Self::Send(PathBuf::from(rest))),
            "send" => Err(usage("send <path>")),
            "shutdown" => Ok(Self::Shutdown),
            "dnd" => match rest.to_ascii_lowercase().as_str() {
                "on" | "true" => Ok(Self::Dnd(true)),
                "off" | "false" => Ok(Self::Dnd(false)),
                _ => Err(usage("dnd on|off")),
            },
            "apps" => Ok(Self::Apps),
            "notify" => {
                let mut parts = rest.splitn(3, char::is_whitespace);
                let package = parts.next().unwrap_or_default();
                let title = parts.next().unwrap_or_default();
                if package.is_empty() || title.is_empty() {
                    return Err(usage("notify <package> <title> [text]"));
                }
                Ok(Self::Notify {
                    package: package.to_string(),
                    title: title.to_string(),
                    text: parts.next().unwrap_or_default().trim().to_string(),
                })
            }
            "remove" if !rest.is_empty() => Ok(Self::Remove(rest.to_string())),
            "remove" => Err(usage("remove <key>")),
            "help" | "?" => Ok(Self::Help),
            "" => Err(ParseCommandError("empty command".into())),
            other => Err(ParseCommandError(format!("unknown command: {other}"))),
        }
    }
}

pub const HELP: &[&str] = &[
    "scan                           probe configured satellites",
    "connect <index|address>        pick a satellite from the candidate list",
    "forget                         forget the remembered satellite and stop",
    "start | stop                   start or stop the link",
    "send <path>                    send a file",
    "shutdown                       power off the satellite",
    "dnd on|off                     toggle do-not-disturb on the satellite",
    "apps                           request the satellite's application list",
    "notify <package> <title> [text]  mirror a notification",
    "remove <key>                   withdraw a mirrored notification",
];
