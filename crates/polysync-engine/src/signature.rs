//! Command signature verification.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use polysync_protocol::{GameCommand, PlayerId};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decides whether a command's `auth_sig` is acceptable.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, command: &GameCommand) -> bool;
}

/// Accepts everything. For single-device play where every player shares one process.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissiveVerifier;

impl SignatureVerifier for PermissiveVerifier {
    fn verify(&self, _command: &GameCommand) -> bool {
        true
    }
}

/// HMAC-SHA256 over [`GameCommand::signing_payload`], keyed per player.
#[derive(Clone, Default)]
pub struct HmacVerifier {
    keys: HashMap<PlayerId, Vec<u8>>,
}

impl std::fmt::Debug for HmacVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacVerifier")
            .field("players", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HmacVerifier {
    pub fn new(keys: impl IntoIterator<Item = (PlayerId, Vec<u8>)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn with_key(mut self, player: PlayerId, key: impl Into<Vec<u8>>) -> Self {
        self.keys.insert(player, key.into());
        self
    }

    fn mac_for(&self, command: &GameCommand) -> Option<HmacSha256> {
        let key = self.keys.get(&command.player_id)?;
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(&command.signing_payload());
        Some(mac)
    }

    /// Signature the command's player would produce, if their key is known.
    pub fn signature_for(&self, command: &GameCommand) -> Option<Vec<u8>> {
        self.mac_for(command)
            .map(|mac| mac.finalize().into_bytes().to_vec())
    }

    /// Fills `auth_sig`. Returns false when the player has no key.
    pub fn sign(&self, command: &mut GameCommand) -> bool {
        match self.signature_for(command) {
            Some(sig) => {
                command.auth_sig = sig;
                true
            }
            None => false,
        }
    }
}

impl SignatureVerifier for HmacVerifier {
    fn verify(&self, command: &GameCommand) -> bool {
        if command.auth_sig.is_empty() {
            return false;
        }
        self.mac_for(command)
            .is_some_and(|mac| mac.verify_slice(&command.auth_sig).is_ok())
    }
}
