// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Reversible obfuscation of output-folder segments in public URLs.
//!
//! Bundle URLs embed the output folder of the view they belong to. The
//! folder name is encrypted so clients can neither read the server's
//! directory layout nor guess the URLs of other compiled views.
//!
//! This is not password-grade secrecy, but it is authenticated: a segment
//! produced under another key, or tampered with, fails to
//! [`clarify`](PathObfuscator::clarify) instead of decoding to garbage.
//!
//! Format: `base64url(nonce ‖ ciphertext ‖ tag)` without padding, using
//! AES-256-GCM keyed with SHA-256 of the key material.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::{Result, SsrError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Symmetric cipher for URL path segments, one per renderer.
#[derive(Clone)]
pub struct PathObfuscator {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PathObfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathObfuscator").finish_non_exhaustive()
    }
}

impl PathObfuscator {
    /// Creates an obfuscator keyed by a one-way hash of `key_material`
    /// (the project directory, or an explicitly configured key).
    pub fn new(key_material: &str) -> Result<Self> {
        let key = Sha256::digest(key_material.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| SsrError::Configuration(format!("Invalid obfuscation key: {}", e)))?;
        Ok(Self { cipher })
    }

    /// Encrypts a segment into a URL-safe token. Every call uses a fresh
    /// nonce, so the same input yields different tokens.
    pub fn obfuscate(&self, segment: &str) -> Result<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), segment.as_bytes())
            .map_err(|_| SsrError::Configuration("Failed to obfuscate path segment".to_string()))?;

        let mut token = Vec::with_capacity(NONCE_LEN + sealed.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(token))
    }

    /// Decrypts a token produced by [`obfuscate`](Self::obfuscate).
    ///
    /// # Errors
    ///
    /// [`SsrError::Decryption`] for malformed, truncated, tampered or
    /// foreign-key tokens.
    pub fn clarify(&self, token: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| SsrError::Decryption(format!("malformed segment: {}", e)))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(SsrError::Decryption("segment is too short".to_string()));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plain = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| SsrError::Decryption("segment failed authentication".to_string()))?;

        String::from_utf8(plain)
            .map_err(|_| SsrError::Decryption("segment is not valid UTF-8".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clarify_reverses_obfuscate() {
        let obfuscator = PathObfuscator::new("/srv/app").unwrap();
        for segment in ["Index", "views/a/b/Test", "ünïcödé/päth", "x"] {
            let token = obfuscator.obfuscate(segment).unwrap();
            assert!(!token.contains('/'));
            if segment.len() >= 4 {
                assert!(!token.contains(segment));
            }
            assert_eq!(obfuscator.clarify(&token).unwrap(), segment);
        }
    }

    #[test]
    fn tokens_are_not_deterministic() {
        let obfuscator = PathObfuscator::new("/srv/app").unwrap();
        let a = obfuscator.obfuscate("Index").unwrap();
        let b = obfuscator.obfuscate("Index").unwrap();
        assert_ne!(a, b);
        assert_eq!(obfuscator.clarify(&a).unwrap(), obfuscator.clarify(&b).unwrap());
    }

    #[test]
    fn another_key_cannot_clarify() {
        let first = PathObfuscator::new("/srv/app").unwrap();
        let second = PathObfuscator::new("/srv/other").unwrap();
        let token = first.obfuscate("views/Index").unwrap();
        assert!(second.clarify(&token).unwrap_err().is_decryption());
    }

    #[test]
    fn garbage_and_tampering_are_rejected() {
        let obfuscator = PathObfuscator::new("key").unwrap();
        assert!(obfuscator.clarify("not base64 !").unwrap_err().is_decryption());
        assert!(obfuscator.clarify("c2hvcnQ").unwrap_err().is_decryption());

        let token = obfuscator.obfuscate("Index").unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let forged = URL_SAFE_NO_PAD.encode(raw);
        assert!(obfuscator.clarify(&forged).unwrap_err().is_decryption());
    }
}
