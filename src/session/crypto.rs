//! Password encryption for the SSO login form
//!
//! The login page encrypts the password with AES-128 in ECB mode, PKCS#7
//! padding, under a key baked into the page, and sends it base64 encoded.

use crate::{Error, Result};
use aes::Aes128;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use ecb::cipher::{BlockEncryptMut, KeyInit, block_padding::Pkcs7};

type Aes128EcbEnc = ecb::Encryptor<Aes128>;

/// Encrypt `password` the way the login page does
pub fn encrypt_password(password: &str, key: &[u8]) -> Result<String> {
    let cipher = Aes128EcbEnc::new_from_slice(key)
        .map_err(|e| Error::Crypto(format!("invalid AES-128 key ({} bytes): {}", key.len(), e)))?;

    let encrypted = cipher.encrypt_padded_vec_mut::<Pkcs7>(password.as_bytes());
    Ok(STANDARD.encode(encrypted))
}
