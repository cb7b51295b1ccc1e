//! Session-keyed block cipher and key derivation.
//!
//! Both key and IV are fully determined by the session: the key by the
//! shared secret, the IV by the identity. The server relies on this to
//! recompute a stored payload's ciphertext when checking its at-rest tag.

use crate::error::VaultError;
use crate::types::{IV_LEN, KEY_LEN, SharedSecret};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use sha2::Sha256;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Domain-separation salt for session key derivation.
const KDF_SALT: &[u8] = b"sanctum.session.v1";

/// HKDF info label for the data-encryption key.
const KDF_INFO_DATA_KEY: &[u8] = b"data key";

/// Derives the AES-256 key from the session's shared secret.
///
/// HKDF-SHA-256 with a fixed salt and info label, so the same secret
/// always yields the same key.
#[must_use]
pub fn derive_key(secret: &SharedSecret) -> [u8; KEY_LEN] {
    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), secret.as_bytes());
    let mut key = [0u8; KEY_LEN];
    hk.expand(KDF_INFO_DATA_KEY, &mut key)
        .expect("a 32-byte HKDF-SHA-256 output is always within bounds");
    key
}

/// Derives the CBC IV from the session identity: its first [`IV_LEN`]
/// bytes, taken as raw IV material.
///
/// The IV is therefore constant for the lifetime of a session. That is
/// required for the deterministic at-rest recomputation and acceptable
/// only because the store holds a single logical slot per session; see
/// the crate docs.
///
/// # Errors
/// Returns [`VaultError::InvalidIdentity`] if the identity is shorter
/// than [`IV_LEN`] bytes.
pub fn derive_iv(identity: &str) -> Result<[u8; IV_LEN], VaultError> {
    let raw = identity.as_bytes();
    if raw.len() < IV_LEN {
        return Err(VaultError::InvalidIdentity {
            message: format!("need at least {IV_LEN} bytes, got {}", raw.len()).into(),
            context: None,
        });
    }
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&raw[..IV_LEN]);
    Ok(iv)
}

/// Encrypts a payload with AES-256-CBC and PKCS#7 padding.
///
/// The cipher itself carries no authentication; a ciphertext must always
/// travel or rest with its HMAC tag.
#[must_use]
pub fn encrypt(plaintext: &[u8], key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypts an AES-256-CBC ciphertext.
///
/// Must only be called after the relevant tag check has passed; a wrong
/// key or tampered ciphertext either fails padding here or decrypts to
/// garbage, which is exactly why the tag layer is mandatory.
///
/// # Errors
/// Returns [`VaultError::Decryption`] on malformed ciphertext (length not
/// a whole number of blocks, or invalid padding after decryption).
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, VaultError> {
    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| VaultError::Decryption {
            message: "ciphertext is malformed".into(),
            context: None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = "frXPQ2NjbWp5kTz84hGwRsAe";

    #[test]
    fn test_key_derivation_is_deterministic() {
        let secret = SharedSecret::generate().unwrap();
        assert_eq!(derive_key(&secret), derive_key(&secret));
    }

    #[test]
    fn test_different_secrets_derive_different_keys() {
        let a = SharedSecret::generate().unwrap();
        let b = SharedSecret::generate().unwrap();
        assert_ne!(derive_key(&a), derive_key(&b));
    }

    #[test]
    fn test_iv_is_identity_prefix() {
        let iv = derive_iv(IDENTITY).unwrap();
        assert_eq!(&iv, &IDENTITY.as_bytes()[..IV_LEN]);
    }

    #[test]
    fn test_short_identity_is_rejected() {
        let result = derive_iv("too-short");
        assert!(matches!(result, Err(VaultError::InvalidIdentity { .. })));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let secret = SharedSecret::generate().unwrap();
        let key = derive_key(&secret);
        let iv = derive_iv(IDENTITY).unwrap();

        for plaintext in [&b""[..], b"x", b"hello", &[0u8; 1024]] {
            let ciphertext = encrypt(plaintext, &key, &iv);
            assert_eq!(decrypt(&ciphertext, &key, &iv).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_key_fails_or_garbles() {
        let key = derive_key(&SharedSecret::generate().unwrap());
        let other = derive_key(&SharedSecret::generate().unwrap());
        let iv = derive_iv(IDENTITY).unwrap();

        let ciphertext = encrypt(b"hello", &key, &iv);
        match decrypt(&ciphertext, &other, &iv) {
            Err(VaultError::Decryption { .. }) => {},
            Ok(garbage) => assert_ne!(garbage, b"hello"),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_truncated_ciphertext_is_rejected() {
        let secret = SharedSecret::generate().unwrap();
        let key = derive_key(&secret);
        let iv = derive_iv(IDENTITY).unwrap();

        let ciphertext = encrypt(b"hello", &key, &iv);
        let result = decrypt(&ciphertext[..ciphertext.len() - 1], &key, &iv);
        assert!(matches!(result, Err(VaultError::Decryption { .. })));
    }
}
