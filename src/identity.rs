//! Deterministic keypair derivation: `privateKey(address) = HMAC-SHA256(serverSecret, address)`.
//!
//! Grounded on `pkg/feed/feed.go::PrivateKeyFromFeed` and `pkg/new/domain/nostr/nostr.go`.

use hmac::{Hmac, Mac};
use nostr::key::{Keys, PublicKey, SecretKey};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("server secret must not be empty")]
    EmptySecret,
    #[error("invalid HMAC key length")]
    InvalidKeyLength,
    #[error("derived scalar is not a valid secp256k1 private key")]
    InvalidScalar(#[from] nostr::key::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// A feed's virtual identity: a Schnorr keypair deterministically bound to its URL.
#[derive(Clone)]
pub struct Identity {
    keys: Keys,
}

impl Identity {
    /// Wraps an already-derived keypair, e.g. one loaded back from the
    /// catalog rather than freshly derived from a server secret.
    pub fn from_keys(keys: Keys) -> Self {
        Self { keys }
    }

    /// Derives the identity for `address` under `server_secret`.
    ///
    /// Deterministic and pure: the same `(server_secret, address)` always yields the
    /// same keypair. Rotating `server_secret` re-keys every feed.
    pub fn derive(server_secret: &str, address: &str) -> Result<Self> {
        if server_secret.is_empty() {
            return Err(IdentityError::EmptySecret);
        }

        let mut mac =
            HmacSha256::new_from_slice(server_secret.as_bytes()).map_err(|_| IdentityError::InvalidKeyLength)?;
        mac.update(address.as_bytes());
        let digest = mac.finalize().into_bytes();

        let secret_key = SecretKey::from_slice(&digest)?;
        let keys = Keys::new(secret_key);

        Ok(Self { keys })
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn secret_key(&self) -> &SecretKey {
        self.keys.secret_key()
    }

    pub fn private_key_hex(&self) -> String {
        self.keys.secret_key().to_secret_hex()
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key().to_hex()
    }

    /// NIP-19 bech32 encoding of the public key. Display/logging only, never for
    /// wire comparisons (see SPEC_FULL §4.1).
    pub fn npub(&self) -> Result<String> {
        use nostr::nips::nip19::ToBech32;
        Ok(self.public_key().to_bech32().map_err(|_| IdentityError::InvalidKeyLength)?)
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }
}
