use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CREATE_SESSION_PATH: &str = "lightstreamer/create_session.txt";
pub const BIND_SESSION_PATH: &str = "lightstreamer/bind_session.txt";
pub const CONTROL_PATH: &str = "lightstreamer/control.txt";

pub const OK_CMD: &str = "OK";
pub const PROBE_CMD: &str = "PROBE";
pub const END_CMD: &str = "END";
pub const LOOP_CMD: &str = "LOOP";
pub const ERROR_CMD: &str = "ERROR";
pub const SYNC_ERROR_CMD: &str = "SYNC ERROR";
pub const PREAMBLE_PREFIX: &str = "Preamble";

pub const SESSION_ID_KEY: &str = "SessionId";
pub const CONTROL_ADDRESS_KEY: &str = "ControlAddress";

const FIELD_SEPARATOR: char = '|';
const EMPTY_SENTINEL: &str = "$";
const ABSENT_SENTINEL: &str = "#";

/// Locally assigned subscription table identifier.
pub type TableId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionMode {
    Merge,
    Distinct,
    Command,
    Raw,
}

impl SubscriptionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "MERGE",
            Self::Distinct => "DISTINCT",
            Self::Command => "COMMAND",
            Self::Raw => "RAW",
        }
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionMode {
    type Err = DecodeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "MERGE" => Ok(Self::Merge),
            "DISTINCT" => Ok(Self::Distinct),
            "COMMAND" => Ok(Self::Command),
            "RAW" => Ok(Self::Raw),
            _ => Err(DecodeError::UnknownMode(value.to_string())),
        }
    }
}

/// Control channel operations (`LS_op`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Add,
    Delete,
    Destroy,
}

impl ControlOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Destroy => "destroy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("update line has no table id separator: {0:?}")]
    MissingTableId(String),

    #[error("invalid table id in update line: {0:?}")]
    InvalidTableId(String),

    #[error("update payload has no item position")]
    MissingItemPosition,

    #[error("invalid item position: {0:?}")]
    InvalidItemPosition(String),

    #[error("item position {position} outside 1..={items}")]
    ItemPositionOutOfRange { position: usize, items: usize },

    #[error("unknown subscription mode: {0}")]
    UnknownMode(String),
}

/// A single line read from the stream connection, classified by its leading
/// token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLine<'a> {
    Probe,
    Preamble,
    Blank,
    Error(&'a str),
    Loop,
    SyncError,
    /// Server closed the session; carries the optional cause text.
    End(Option<&'a str>),
    Update(&'a str),
}

impl<'a> StreamLine<'a> {
    /// Prefix checks run in a fixed order; `SYNC ERROR` does not collide with
    /// the `ERROR` prefix.
    pub fn classify(line: &'a str) -> Self {
        if line == PROBE_CMD {
            Self::Probe
        } else if line.starts_with(ERROR_CMD) {
            Self::Error(line[ERROR_CMD.len()..].trim())
        } else if line.starts_with(LOOP_CMD) {
            Self::Loop
        } else if line.starts_with(SYNC_ERROR_CMD) {
            Self::SyncError
        } else if let Some(cause) = line.strip_prefix(END_CMD) {
            let cause = cause.trim();
            Self::End((!cause.is_empty()).then_some(cause))
        } else if line.starts_with(PREAMBLE_PREFIX) {
            Self::Preamble
        } else if line.is_empty() {
            Self::Blank
        } else {
            Self::Update(line)
        }
    }
}

/// Splits `<tableId>,<payload>` on the first comma.
pub fn parse_update_line(line: &str) -> Result<(TableId, &str), DecodeError> {
    let (table, payload) = line
        .split_once(',')
        .ok_or_else(|| DecodeError::MissingTableId(line.to_string()))?;
    let table_id = table
        .trim()
        .parse::<TableId>()
        .map_err(|_| DecodeError::InvalidTableId(table.to_string()))?;
    Ok((table_id, payload))
}

/// Splits an update payload into its 1-based item position and raw field
/// tokens.
pub fn split_payload(payload: &str) -> Result<(usize, Vec<&str>), DecodeError> {
    let payload = payload.trim_end_matches(['\r', '\n']);
    let mut tokens = payload.split(FIELD_SEPARATOR);
    let position = tokens
        .next()
        .filter(|token| !token.is_empty())
        .ok_or(DecodeError::MissingItemPosition)?;
    let position = position
        .parse::<usize>()
        .map_err(|_| DecodeError::InvalidItemPosition(position.to_string()))?;
    Ok((position, tokens.collect()))
}

/// Decodes one field token against the last known value of that field.
///
/// `$` is an explicit empty string, `#` an explicit absent value, and the
/// empty token means "unchanged". A leading sentinel followed by more text is
/// stripped and the remainder taken literally.
pub fn decode_field(token: &str, last: Option<&str>) -> Option<String> {
    match token {
        EMPTY_SENTINEL => Some(String::new()),
        ABSENT_SENTINEL => None,
        "" => last.map(str::to_string),
        _ => {
            let literal = token.strip_prefix(['#', '$']).unwrap_or(token);
            Some(literal.to_string())
        }
    }
}

/// Key/value block that follows an `OK` create/bind response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionHeader {
    params: BTreeMap<String, String>,
}

impl SessionHeader {
    /// Adds one header line; the key ends at the first `:`.
    pub fn push_line(&mut self, line: &str) -> Result<(), String> {
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| format!("malformed session header line: {line:?}"))?;
        self.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get(SESSION_ID_KEY).filter(|id| !id.is_empty())
    }

    pub fn control_address(&self) -> Option<&str> {
        self.get(CONTROL_ADDRESS_KEY).filter(|addr| !addr.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn into_params(self) -> BTreeMap<String, String> {
        self.params
    }
}

/// Drops parameters with empty values, which the server treats as unset.
pub fn non_empty_params(params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
    params
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

/// First line of a control response with line terminators removed.
pub fn control_response_line(body: &str) -> String {
    body.lines()
        .next()
        .unwrap_or_default()
        .trim_end_matches(['\r', '\n'])
        .to_string()
}
