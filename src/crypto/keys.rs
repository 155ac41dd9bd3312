use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroize;

use super::encryption::EncryptedBlob;
use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const KEY_LENGTH: usize = 32; // AES-256
pub const SALT_LENGTH: usize = 32;

/// Document encryption key — zeroed on drop.
///
/// One key per deployment; blobs written by ingress and read by the worker
/// are sealed under the same key. Key distribution is external.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DocumentKey {
    pub(super) key_bytes: [u8; KEY_LENGTH],
}

impl DocumentKey {
    /// Derive from passphrase + salt using PBKDF2-SHA256.
    pub fn derive(passphrase: &str, salt: &[u8; SALT_LENGTH]) -> Self {
        let mut key_bytes = [0u8; KEY_LENGTH];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key_bytes);
        Self { key_bytes }
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key_bytes = [0u8; KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut key_bytes);
        Self { key_bytes }
    }

    /// Wrap raw key material obtained from an external key manager.
    pub fn from_bytes(key_bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key_bytes }
    }

    /// Encrypt document bytes using AES-256-GCM.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedBlob, CryptoError> {
        EncryptedBlob::encrypt(&self.key_bytes, plaintext)
    }

    /// Decrypt an encrypted blob using AES-256-GCM.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<Vec<u8>, CryptoError> {
        blob.decrypt(&self.key_bytes)
    }
}

/// Generate a cryptographically random salt.
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
