use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CanonicalWriter, ClientId, Coord, Digest, GameId, PieceId, PlayerId, PIECE_SET_VERSION,
    RULES_VERSION, SCHEMA_VERSION,
};

/// What a player wants to do on their turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    Place {
        piece_id: PieceId,
        variant_id: u16,
        origin: Coord,
    },
    Pass,
}

impl Action {
    pub fn place(piece_id: impl Into<String>, variant_id: u16, origin: Coord) -> Self {
        Action::Place {
            piece_id: PieceId::new(piece_id),
            variant_id,
            origin,
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Action::Pass)
    }

    /// Appends the action in canonical form (tag byte first).
    pub fn encode(&self, w: &mut CanonicalWriter) {
        match self {
            Action::Place {
                piece_id,
                variant_id,
                origin,
            } => {
                w.append_u8(1)
                    .append_string(piece_id.as_str())
                    .append_u16(*variant_id)
                    .append_i64(i64::from(origin.x))
                    .append_i64(i64::from(origin.y));
            }
            Action::Pass => {
                w.append_u8(2);
            }
        }
    }
}

/// Client-issued intent. `command_id` is the idempotency key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameCommand {
    pub command_id: Uuid,
    pub client_id: ClientId,
    pub expected_seq: u64,
    pub player_id: PlayerId,
    pub action: Action,
    pub game_id: GameId,
    pub schema_version: u16,
    pub rules_version: u16,
    pub piece_set_version: u16,
    pub issued_at: DateTime<Utc>,
    pub issued_nanos: i64,
    /// Replay guard, unique per player.
    pub nonce: i64,
    /// HMAC-SHA256 over [`GameCommand::signing_payload`]; empty when unsigned.
    #[serde(default, with = "hex_bytes")]
    pub auth_sig: Vec<u8>,
}

impl GameCommand {
    /// Builds an unsigned command stamped with the compiled protocol versions.
    pub fn new(
        game_id: GameId,
        client_id: ClientId,
        player_id: PlayerId,
        expected_seq: u64,
        action: Action,
        issued_at: DateTime<Utc>,
        nonce: i64,
    ) -> Self {
        Self {
            command_id: Uuid::new_v4(),
            client_id,
            expected_seq,
            player_id,
            action,
            game_id,
            schema_version: SCHEMA_VERSION,
            rules_version: RULES_VERSION,
            piece_set_version: PIECE_SET_VERSION,
            issued_nanos: issued_at.timestamp_nanos_opt().unwrap_or_default(),
            issued_at,
            nonce,
            auth_sig: Vec::new(),
        }
    }

    /// SHA-256 over the semantic fields. The signature, timestamps, nonce and client id are not
    /// covered.
    pub fn command_fingerprint(&self) -> Digest {
        let mut w = CanonicalWriter::new();
        w.append_string(self.game_id.as_str())
            .append_u16(self.schema_version)
            .append_u16(self.rules_version)
            .append_u16(self.piece_set_version)
            .append_u8(self.player_id.code());
        self.action.encode(&mut w);
        w.append_u64(self.expected_seq)
            .append_data(self.command_id.as_bytes());
        w.sha256()
    }

    /// Bytes covered by `auth_sig`.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        w.append_digest(&self.command_fingerprint())
            .append_i64(self.issued_nanos)
            .append_i64(self.nonce);
        w.into_bytes()
    }

    pub fn versions(&self) -> (u16, u16, u16) {
        (self.schema_version, self.rules_version, self.piece_set_version)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GameCommand {
        GameCommand::new(
            GameId::new("G"),
            ClientId::new("device-a"),
            PlayerId::Blue,
            0,
            Action::place("mono-1", 0, Coord::new(0, 0)),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            7,
        )
    }

    #[test]
    fn fingerprint_ignores_signature_and_transport_fields() {
        let a = sample();
        let mut b = a.clone();
        b.auth_sig = vec![1, 2, 3];
        b.nonce = 99;
        b.client_id = ClientId::new("device-b");
        b.issued_nanos += 5;
        assert_eq!(a.command_fingerprint(), b.command_fingerprint());
    }

    #[test]
    fn fingerprint_covers_semantic_fields() {
        let a = sample();

        let mut moved = a.clone();
        moved.action = Action::place("mono-1", 0, Coord::new(0, 1));
        assert_ne!(a.command_fingerprint(), moved.command_fingerprint());

        let mut later = a.clone();
        later.expected_seq = 1;
        assert_ne!(a.command_fingerprint(), later.command_fingerprint());

        let mut other_id = a.clone();
        other_id.command_id = Uuid::new_v4();
        assert_ne!(a.command_fingerprint(), other_id.command_fingerprint());
    }

    #[test]
    fn signing_payload_changes_with_nonce() {
        let a = sample();
        let mut b = a.clone();
        b.nonce += 1;
        assert_ne!(a.signing_payload(), b.signing_payload());
    }

    #[test]
    fn json_keeps_signature_as_hex() {
        let mut cmd = sample();
        cmd.auth_sig = vec![0xab, 0xcd];
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"auth_sig\":\"abcd\""));
        let back: GameCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }
}
