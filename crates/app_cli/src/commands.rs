use std::path::PathBuf;

use core_types::BackendKind;
use serde_json::Value;

pub const HELP: &str = "\
commands:
  /get <key>            show a setting, e.g. /get ai_backend.lmstudio.port
  /set <key> <value>    change a setting (JSON value, bare words are strings)
  /backend <cloud|local> switch the active backend
  /reset                restore default settings
  /export <path>        save the conversation (.json or text)
  /history              print the whole conversation
  /help                 show this list
  /quit                 save history and leave
anything else is sent to the assistant";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    Get(String),
    Set { key: String, value: Value },
    Backend(BackendKind),
    Reset,
    Export(PathBuf),
    History,
    Help,
    Quit,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    match name {
        "get" if args.is_empty() => Err("usage: /get <key>".to_string()),
        "get" => Ok(Command::Get(args.to_string())),
        "set" => {
            let (key, raw) = args
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: /set <key> <value>".to_string())?;
            Ok(Command::Set {
                key: key.to_string(),
                value: parse_value(raw.trim()),
            })
        }
        "backend" => args
            .parse::<BackendKind>()
            .map(Command::Backend)
            .map_err(|err| err.to_string()),
        "export" if args.is_empty() => Err("usage: /export <path>".to_string()),
        "export" => Ok(Command::Export(PathBuf::from(args))),
        "reset" => Ok(Command::Reset),
        "history" => Ok(Command::History),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command `/{other}`, try /help")),
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
