//! Event id hashing, Schnorr signing, and public key decoding.

use secp256k1::{schnorr::Signature, Keypair, Message, Secp256k1, XOnlyPublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::event::{Event, EventDraft, Tag};

const NPUB_HRP: &str = "npub";

/// Errors from key handling, signing, and verification.
#[derive(Debug, Error)]
pub enum KeyError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The secp256k1 library rejected a key, message, or signature.
    #[error("secp256k1 error: {0}")]
    Secp(#[from] secp256k1::Error),

    /// The canonical serialization could not be produced.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A bech32 string could not be decoded.
    #[error("invalid bech32: {0}")]
    Bech32(String),

    /// The bech32 prefix was not the expected one.
    #[error("expected '{expected}' prefix, got '{got}'")]
    WrongPrefix {
        /// The prefix we accept.
        expected: &'static str,
        /// The prefix we received.
        got: String,
    },

    /// A key had the wrong byte length.
    #[error("expected 32 key bytes, got {0}")]
    KeyLength(usize),

    /// The recomputed id does not match the event's id.
    #[error("event id does not match its content")]
    IdMismatch,
}

/// Computes the NIP-01 id hash over `[0, pubkey, created_at, kind, tags, content]`.
pub fn event_hash(
    pubkey: &str,
    created_at: i64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; 32], KeyError> {
    let canonical = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let data = serde_json::to_vec(&canonical)?;
    Ok(Sha256::digest(&data).into())
}

/// Verifies an event's id and Schnorr signature.
pub fn verify_event(ev: &Event) -> Result<(), KeyError> {
    let hash = event_hash(&ev.pubkey, ev.created_at, ev.kind, &ev.tags, &ev.content)?;
    if hex::encode(hash) != ev.id {
        return Err(KeyError::IdMismatch);
    }
    let sig = Signature::from_slice(&hex::decode(&ev.sig)?)?;
    let pk = XOnlyPublicKey::from_slice(&hex::decode(&ev.pubkey)?)?;
    let msg = Message::from_digest_slice(&hash)?;
    Secp256k1::verification_only().verify_schnorr(&sig, &msg, &pk)?;
    Ok(())
}

/// Decodes a public key given either as 64 hex characters or as `npub1...`.
///
/// Returns the lowercase hex form.
pub fn decode_pubkey(input: &str) -> Result<String, KeyError> {
    let bytes = if input.starts_with(NPUB_HRP) {
        let expected =
            bech32::Hrp::parse(NPUB_HRP).map_err(|e| KeyError::Bech32(e.to_string()))?;
        let (hrp, data) = bech32::decode(input).map_err(|e| KeyError::Bech32(e.to_string()))?;
        if hrp != expected {
            return Err(KeyError::WrongPrefix {
                expected: NPUB_HRP,
                got: hrp.to_string(),
            });
        }
        data
    } else {
        hex::decode(input)?
    };

    if bytes.len() != 32 {
        return Err(KeyError::KeyLength(bytes.len()));
    }
    Ok(hex::encode(bytes))
}

/// The relay's own signing identity.
///
/// Used to sign events the relay originates, such as reputation queries.
#[derive(Clone)]
pub struct RelayKeys {
    keypair: Keypair,
}

impl RelayKeys {
    /// Loads a keypair from a 32-byte secret key in hex.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let secret = hex::decode(secret_hex.trim())?;
        let keypair = Keypair::from_seckey_slice(&Secp256k1::new(), &secret)?;
        Ok(Self { keypair })
    }

    /// The x-only public key in hex.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.keypair.x_only_public_key().0.serialize())
    }

    /// Computes the id of `draft` under this key and signs it.
    pub fn sign(&self, draft: EventDraft) -> Result<Event, KeyError> {
        let pubkey = self.public_key_hex();
        let hash = event_hash(
            &pubkey,
            draft.created_at,
            draft.kind,
            &draft.tags,
            &draft.content,
        )?;
        let msg = Message::from_digest_slice(&hash)?;
        let sig = Secp256k1::new().sign_schnorr_no_aux_rand(&msg, &self.keypair);

        Ok(Event {
            id: hex::encode(hash),
            pubkey,
            created_at: draft.created_at,
            kind: draft.kind,
            tags: draft.tags,
            content: draft.content,
            sig: hex::encode(sig.serialize()),
        })
    }
}

impl std::fmt::Debug for RelayKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayKeys")
            .field("pubkey", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
