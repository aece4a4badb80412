//! JSON and MessagePack helpers for moving commands, events and snapshots across process
//! boundaries. Hash inputs never go through these encoders; see [`crate::canonical`].

use rmp_serde::{decode, encode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::{EventGap, GameCommand, MoveEvent};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn to_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    // Named fields so older readers tolerate added fields.
    Ok(encode::to_vec_named(value)?)
}

pub fn from_msgpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string(value)?)
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_command(cmd: &GameCommand) -> Result<Vec<u8>, WireError> {
    to_msgpack(cmd)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<GameCommand, WireError> {
    from_msgpack(bytes)
}

pub fn serialize_events(events: &[MoveEvent]) -> Result<Vec<u8>, WireError> {
    to_msgpack(&events)
}

pub fn deserialize_events(bytes: &[u8]) -> Result<Vec<MoveEvent>, WireError> {
    from_msgpack(bytes)
}

pub fn serialize_command_json(cmd: &GameCommand) -> Result<String, WireError> {
    to_json(cmd)
}

pub fn deserialize_command_json(json: &str) -> Result<GameCommand, WireError> {
    from_json(json)
}

pub fn serialize_events_json(events: &[MoveEvent]) -> Result<String, WireError> {
    to_json(&events)
}

pub fn deserialize_events_json(json: &str) -> Result<Vec<MoveEvent>, WireError> {
    from_json(json)
}

pub fn serialize_gaps_json(gaps: &[EventGap]) -> Result<String, WireError> {
    to_json(&gaps)
}

pub fn deserialize_gaps_json(json: &str) -> Result<Vec<EventGap>, WireError> {
    from_json(json)
}

/// One event per line, as written by append-only logs.
pub fn event_to_json_line(event: &MoveEvent) -> Result<String, WireError> {
    to_json(event)
}

/// Parses a JSON-lines event log, skipping blank lines.
pub fn events_from_json_lines(text: &str) -> Result<Vec<MoveEvent>, WireError> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(from_json)
        .collect()
}
