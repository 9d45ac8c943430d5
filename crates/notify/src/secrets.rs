//! Decryption of secure notifier settings.
//!
//! Secure values are stored as AES-256-GCM ciphertext in the text form
//! `iv:tag:ciphertext` (hex). The [`Decryptor`] capability is injected by
//! the host; [`SecretResolver`] applies it to a settings blob field by field.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::error::DecryptionError;
use crate::settings::NotifierSettings;

/// Turns stored ciphertext into plaintext.
///
/// The returned `DecryptionError` carries an empty `field`; the resolver
/// fills it in.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError>;
}

/// Pass-through decryptor for hosts without an encryption key, and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextDecryptor;

impl Decryptor for PlaintextDecryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, DecryptionError> {
        Ok(ciphertext.to_string())
    }
}

/// AES-256-GCM decryptor over the `iv:tag:ciphertext` hex format.
#[derive(Clone)]
pub struct AesGcmDecryptor {
    key: [u8; 32],
}

impl AesGcmDecryptor {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Parse a 64-character hex key.
    pub fn from_hex(hex_key: &str) -> Result<Self, DecryptionError> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| DecryptionError::new("", format!("invalid key encoding: {e}")))?;
        if bytes.len() != 32 {
            return Err(DecryptionError::new(
                "",
                format!("key must be 32 bytes, got {}", bytes.len()),
            ));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        Ok(Self::new(key))
    }

    /// Encrypt a value into the stored text form. Used when writing
    /// secure settings.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, DecryptionError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| DecryptionError::new("", format!("failed to create cipher: {e}")))?;

        let mut iv_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut iv_bytes);
        let nonce = Nonce::from_slice(&iv_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| DecryptionError::new("", format!("encryption failed: {e}")))?;

        // AES-GCM appends the 16-byte tag to the ciphertext.
        let tag_offset = ciphertext.len() - 16;
        let ct = &ciphertext[..tag_offset];
        let tag = &ciphertext[tag_offset..];

        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv_bytes),
            hex::encode(tag),
            hex::encode(ct)
        ))
    }
}

impl std::fmt::Debug for AesGcmDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmDecryptor").finish_non_exhaustive()
    }
}

impl Decryptor for AesGcmDecryptor {
    fn decrypt(&self, encrypted: &str) -> Result<String, DecryptionError> {
        let fail = |reason: String| DecryptionError::new("", reason);

        let parts: Vec<&str> = encrypted.splitn(3, ':').collect();
        if parts.len() != 3 {
            return Err(fail(
                "invalid format (expected iv:tag:ciphertext)".to_string(),
            ));
        }

        let iv_bytes = hex::decode(parts[0]).map_err(|e| fail(format!("invalid iv: {e}")))?;
        let tag_bytes = hex::decode(parts[1]).map_err(|e| fail(format!("invalid tag: {e}")))?;
        let ct_bytes =
            hex::decode(parts[2]).map_err(|e| fail(format!("invalid ciphertext: {e}")))?;

        if iv_bytes.len() != 12 {
            return Err(fail(format!(
                "invalid IV length: expected 12, got {}",
                iv_bytes.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| fail(format!("failed to create cipher: {e}")))?;
        let nonce = Nonce::from_slice(&iv_bytes);

        // Reconstruct the ciphertext+tag as AES-GCM expects.
        let mut combined = ct_bytes;
        combined.extend_from_slice(&tag_bytes);

        let plaintext = cipher
            .decrypt(nonce, combined.as_ref())
            .map_err(|_| fail("authentication failed".to_string()))?;

        String::from_utf8(plaintext).map_err(|_| fail("plaintext is not UTF-8".to_string()))
    }
}

/// Resolves settings fields, decrypting secure ones on demand.
#[derive(Clone)]
pub struct SecretResolver {
    decryptor: Arc<dyn Decryptor>,
}

impl SecretResolver {
    pub fn new(decryptor: Arc<dyn Decryptor>) -> Self {
        Self { decryptor }
    }

    /// Resolver that treats secure values as plaintext.
    pub fn plaintext() -> Self {
        Self::new(Arc::new(PlaintextDecryptor))
    }

    /// Resolve `field`: the decrypted secure value when one is stored,
    /// otherwise the plain string value, otherwise `""`.
    pub fn resolve(
        &self,
        raw: &NotifierSettings,
        field: &str,
    ) -> Result<String, DecryptionError> {
        if let Some(ciphertext) = raw.secure_settings.get(field) {
            return self.decryptor.decrypt(ciphertext).map_err(|e| DecryptionError {
                field: field.to_string(),
                reason: e.reason,
            });
        }
        Ok(raw.plain_str(field).unwrap_or_default().to_string())
    }
}

impl std::fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretResolver").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn settings(json: serde_json::Value) -> NotifierSettings {
        NotifierSettings::new("test", "webhook", json)
    }

    #[test]
    fn aes_roundtrip() {
        let aes = AesGcmDecryptor::from_hex(KEY_HEX).unwrap();
        let stored = aes.encrypt("hunter2").unwrap();
        assert_eq!(stored.split(':').count(), 3);
        assert!(!stored.contains("hunter2"));
        assert_eq!(aes.decrypt(&stored).unwrap(), "hunter2");
    }

    #[test]
    fn aes_rejects_tampered_ciphertext() {
        let aes = AesGcmDecryptor::from_hex(KEY_HEX).unwrap();
        let stored = aes.encrypt("hunter2").unwrap();
        let mut parts: Vec<String> = stored.split(':').map(String::from).collect();
        parts[2] = "00".repeat(parts[2].len() / 2);
        let err = aes.decrypt(&parts.join(":")).unwrap_err();
        assert_eq!(err.reason, "authentication failed");
    }

    #[test]
    fn aes_rejects_wrong_key_length() {
        assert!(AesGcmDecryptor::from_hex("abcd").is_err());
        assert!(AesGcmDecryptor::from_hex("zz").is_err());
    }

    #[test]
    fn resolve_absent_field_is_empty() {
        let resolver = SecretResolver::plaintext();
        let raw = settings(serde_json::json!({}));
        assert_eq!(resolver.resolve(&raw, "url").unwrap(), "");
    }

    #[test]
    fn resolve_prefers_secure_value() {
        let aes = AesGcmDecryptor::from_hex(KEY_HEX).unwrap();
        let mut raw = settings(serde_json::json!({ "password": "plain-fallback" }));
        raw.secure_settings
            .insert("password".into(), aes.encrypt("s3cret").unwrap());

        let resolver = SecretResolver::new(Arc::new(aes));
        assert_eq!(resolver.resolve(&raw, "password").unwrap(), "s3cret");
    }

    #[test]
    fn resolve_falls_back_to_plain_value() {
        let resolver = SecretResolver::plaintext();
        let raw = settings(serde_json::json!({ "url": "https://example.com/hook" }));
        assert_eq!(
            resolver.resolve(&raw, "url").unwrap(),
            "https://example.com/hook"
        );
    }

    #[test]
    fn resolve_reports_field_on_failure() {
        let aes = AesGcmDecryptor::from_hex(KEY_HEX).unwrap();
        let mut raw = settings(serde_json::json!({}));
        raw.secure_settings
            .insert("bottoken".into(), "not-ciphertext".into());

        let resolver = SecretResolver::new(Arc::new(aes));
        let err = resolver.resolve(&raw, "bottoken").unwrap_err();
        assert_eq!(err.field, "bottoken");
        assert!(!err.to_string().contains("not-ciphertext"));
    }
}
