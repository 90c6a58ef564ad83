use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 24;
const ARCHIVE_AAD: &[u8] = b"archive.payload";

/// Decryption failed authentication, or the blob is malformed. The archive
/// pipeline must never hand corrupted plaintext to a caller; any tag
/// mismatch surfaces as this error instead.
#[derive(Debug)]
pub struct CryptoError {
    pub context: String,
}

impl std::fmt::Display for CryptoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "crypto failure: {}", self.context)
    }
}

impl std::error::Error for CryptoError {}

/// Symmetric key for archived payloads. Derived from the app passphrase
/// today; `from_bytes` accepts a per-user or server-issued key so rotation
/// never touches the `nonce:ciphertext` wire format.
#[derive(Clone)]
pub struct ArchiveKey([u8; 32]);

impl ArchiveKey {
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Result<XChaCha20Poly1305> {
        XChaCha20Poly1305::new_from_slice(&self.0).map_err(|_| anyhow!("invalid key"))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    for pair in text.as_bytes().chunks(2) {
        let hi = (pair[0] as char).to_digit(16)?;
        let lo = (pair[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

/// Encrypts `plaintext` into the archive wire format
/// `<hex nonce>:<base64 ciphertext+tag>` with a fresh random nonce.
pub fn encrypt_payload(key: &ArchiveKey, plaintext: &[u8]) -> Result<String> {
    let cipher = key.cipher()?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: ARCHIVE_AAD,
            },
        )
        .map_err(|_| anyhow!("encrypt failed"))?;

    Ok(format!(
        "{}:{}",
        hex_encode(&nonce_bytes),
        B64.encode(ciphertext)
    ))
}

/// Decrypts an archive blob produced by [`encrypt_payload`]. Tampering with
/// the nonce or the ciphertext fails the authentication tag and returns
/// [`CryptoError`], never wrong plaintext.
pub fn decrypt_payload(key: &ArchiveKey, blob: &str) -> Result<Vec<u8>> {
    let Some((nonce_hex, cipher_b64)) = blob.split_once(':') else {
        return Err(CryptoError {
            context: "missing nonce separator".to_string(),
        }
        .into());
    };

    let nonce_bytes = hex_decode(nonce_hex).ok_or_else(|| CryptoError {
        context: "invalid nonce encoding".to_string(),
    })?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError {
            context: "invalid nonce length".to_string(),
        }
        .into());
    }

    let ciphertext = B64.decode(cipher_b64).map_err(|_| CryptoError {
        context: "invalid ciphertext encoding".to_string(),
    })?;

    let cipher = key.cipher()?;
    let nonce = XNonce::from_slice(&nonce_bytes);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &ciphertext,
                aad: ARCHIVE_AAD,
            },
        )
        .map_err(|_| {
            anyhow::Error::from(CryptoError {
                context: "authentication failed".to_string(),
            })
        })
}
