//! Encryption of certificate access passwords.
//!
//! Envelope layout is deliberately plain: AES-256-CBC with PKCS#7 padding, a
//! fresh random 16-byte IV per encryption, ciphertext and IV stored as
//! separate opaque byte strings. The 32-byte key is derived from the
//! configured master secret with a single SHA-256 pass.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use anyhow::Context;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;

/// Symmetric cipher for certificate passwords, keyed once at startup.
#[derive(Clone)]
pub struct CredentialCipher {
    key: [u8; 32],
}

impl CredentialCipher {
    /// Derives the AES key from the configured master secret.
    ///
    /// Hashing instead of pad/truncate keeps full-entropy keys for secrets of
    /// any length; see DESIGN.md for the recorded deviation.
    #[must_use]
    pub fn new(master_secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(master_secret.as_bytes());
        Self {
            key: hasher.finalize().into(),
        }
    }

    /// Encrypts a password, returning `(ciphertext, iv)`.
    ///
    /// A fresh IV is drawn per call; encrypting the same plaintext twice never
    /// yields the same ciphertext.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut iv = [0u8; IV_LEN];
        OsRng
            .try_fill_bytes(&mut iv)
            .context("failed to generate iv")?;

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        Ok((ciphertext, iv.to_vec()))
    }

    /// Decrypts an envelope back to the password.
    ///
    /// An empty password round-trips to `Ok("")`. A corrupted envelope, a
    /// wrong key, or a mismatched IV fails with [`Error::Decryption`]; it is
    /// never masked as an empty password.
    ///
    /// # Errors
    /// Returns [`Error::Decryption`] when the envelope cannot be decrypted.
    pub fn decrypt(&self, ciphertext: &[u8], iv: &[u8]) -> Result<String> {
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| Error::Decryption)?;

        let padded = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::Decryption)?;

        String::from_utf8(padded).map_err(|_| Error::Decryption)
    }
}
