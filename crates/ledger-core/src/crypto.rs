//! secp256k1 keys, addresses and signatures.
//!
//! A public key travels as hex of its 64-byte `X || Y` point (the uncompressed
//! encoding without the `0x04` tag). An address is the first 40 hex characters
//! of SHA-256 over that hex text. Signatures are compact 64-byte ECDSA
//! signatures over SHA-256 of the signed payload.

use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

use crate::constants::ADDRESS_HEX_SIZE;
use crate::error::{LedgerError, Result};

static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

const UNCOMPRESSED_TAG: u8 = 0x04;

#[derive(Debug, Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| LedgerError::InvalidKey(format!("secret key is not hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| LedgerError::InvalidKey(format!("bad secret key: {e}")))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(&self.public_key.serialize_uncompressed()[1..])
    }

    pub fn address(&self) -> String {
        address_from_public_key_hex(&self.public_key_hex())
    }

    /// Signs SHA-256 of `payload`; returns the compact signature as hex.
    pub fn sign(&self, payload: &[u8]) -> String {
        let message = message_for(payload);
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        hex::encode(signature.serialize_compact())
    }
}

/// Address owned by a public key. Does not check that the key is a valid point.
pub fn address_from_public_key_hex(public_key_hex: &str) -> String {
    let digest = hex::encode(Sha256::digest(public_key_hex.as_bytes()));
    digest[..ADDRESS_HEX_SIZE].to_string()
}

/// Checks `signature_hex` over `payload` against `public_key_hex`.
pub fn verify(public_key_hex: &str, payload: &[u8], signature_hex: &str) -> Result<bool> {
    let public_key = parse_public_key(public_key_hex)?;
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return Ok(false);
    };
    let Ok(signature) = Signature::from_compact(&sig_bytes) else {
        return Ok(false);
    };
    let message = message_for(payload);
    Ok(SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok())
}

fn parse_public_key(public_key_hex: &str) -> Result<PublicKey> {
    let point = hex::decode(public_key_hex)
        .map_err(|e| LedgerError::InvalidKey(format!("public key is not hex: {e}")))?;
    if point.len() != 64 {
        return Err(LedgerError::InvalidKey(format!(
            "public key must be 64 bytes, got {}",
            point.len()
        )));
    }
    let mut tagged = Vec::with_capacity(65);
    tagged.push(UNCOMPRESSED_TAG);
    tagged.extend_from_slice(&point);
    PublicKey::from_slice(&tagged).map_err(|e| LedgerError::InvalidKey(format!("bad public key: {e}")))
}

fn message_for(payload: &[u8]) -> Message {
    Message::from_digest(Sha256::digest(payload).into())
}
