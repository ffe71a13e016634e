//! Password encryption for the generated configuration
//!
//! The key file holds two hex lines, the AES key and the CBC IV, the layout the
//! virt-who agent reads when it decrypts `encrypted_password` values. The file
//! is created on first use. Ciphertexts are PKCS#7 padded and hex encoded so
//! they can be written into the agent's INI-style config.

use crate::{Error, Result};
use cbc::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Key size used for newly created key files (AES-128).
const KEY_SIZE: usize = 16;

const IV_SIZE: usize = 16;

/// Location of the encryption key on disk.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key, creating a fresh one when the file does not exist yet.
    pub fn load_or_create(&self) -> Result<SecretCipher> {
        if !self.path.exists() {
            self.create()?;
        }
        self.load()
    }

    fn create(&self) -> Result<()> {
        let unwritable = |e: std::io::Error| Error::UnwritableKeyFile {
            path: self.path.clone(),
            reason: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(unwritable)?;
        }

        let mut key = [0u8; KEY_SIZE];
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut key);
        OsRng.fill_bytes(&mut iv);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&self.path)
            .map_err(unwritable)?;
        writeln!(file, "{}\n{}", hex::encode(key), hex::encode(iv)).map_err(unwritable)?;
        log::info!("Created encryption key file {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<SecretCipher> {
        let invalid = |reason: String| Error::InvalidKeyFile {
            path: self.path.clone(),
            reason,
        };

        let content = fs::read_to_string(&self.path).map_err(|e| invalid(e.to_string()))?;
        let mut lines = content.lines().map(str::trim);
        let (Some(key), Some(iv)) = (lines.next(), lines.next()) else {
            return Err(invalid("expected a key line and an IV line".to_string()));
        };

        let key = hex::decode(key).map_err(|e| invalid(format!("key is not hex: {}", e)))?;
        let iv = hex::decode(iv).map_err(|e| invalid(format!("IV is not hex: {}", e)))?;
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(invalid(format!("unsupported key length {}", key.len())));
        }
        let iv: [u8; IV_SIZE] = iv
            .try_into()
            .map_err(|v: Vec<u8>| invalid(format!("expected a {} byte IV, found {}", IV_SIZE, v.len())))?;
        Ok(SecretCipher { key, iv })
    }
}

/// Encrypts individual secrets with AES-CBC.
#[derive(Clone)]
pub struct SecretCipher {
    key: Vec<u8>,
    iv: [u8; IV_SIZE],
}

impl SecretCipher {
    /// Encrypt a secret and return the hex encoded ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let data = plaintext.as_bytes();
        let ciphertext = match self.key.len() {
            16 => cbc::Encryptor::<aes::Aes128>::new_from_slices(&self.key, &self.iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            24 => cbc::Encryptor::<aes::Aes192>::new_from_slices(&self.key, &self.iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
            _ => cbc::Encryptor::<aes::Aes256>::new_from_slices(&self.key, &self.iv)
                .map(|c| c.encrypt_padded_vec_mut::<Pkcs7>(data)),
        }
        .map_err(|e| Error::Encryption(format!("Failed to create cipher: {}", e)))?;
        Ok(hex::encode(ciphertext))
    }
}
