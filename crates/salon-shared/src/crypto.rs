//! Cipher envelope: AES-256-CBC with PKCS#7 padding, base64 token encoding.
//!
//! Both key and IV are fixed compile-time constants shared with clients
//! (see [`crate::constants`]). Tokens contain no IV, so the envelope is a
//! compatibility shim, not a security boundary.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::constants::{CIPHER_IV, CIPHER_IV_SIZE, CIPHER_KEY};
use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Encrypt a UTF-8 plaintext into a transportable opaque token.
///
/// The base64 alphabet contains no `\n`, so tokens are always safe to frame
/// with a newline delimiter.
pub fn encrypt(plaintext: &str) -> String {
    let ciphertext = Aes256CbcEnc::new(CIPHER_KEY.into(), CIPHER_IV.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    BASE64.encode(ciphertext)
}

/// Decrypt a token produced by [`encrypt`] back into plaintext.
pub fn decrypt(token: &str) -> Result<String, CryptoError> {
    let ciphertext = BASE64
        .decode(token.trim())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    if ciphertext.is_empty() || ciphertext.len() % CIPHER_IV_SIZE != 0 {
        return Err(CryptoError::DecryptionFailed);
    }

    let plaintext = Aes256CbcDec::new(CIPHER_KEY.into(), CIPHER_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = "Salon, salon, qui parle le plus?";
        let token = encrypt(plaintext);
        assert_eq!(decrypt(&token).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_unicode() {
        let plaintext = "привіт 👋 ёж 🦔";
        assert_eq!(decrypt(&encrypt(plaintext)).unwrap(), plaintext);
    }

    #[test]
    fn test_fixed_iv_is_deterministic() {
        // Same plaintext, same token: a consequence of the fixed IV that
        // existing clients rely on.
        assert_eq!(encrypt("hello"), encrypt("hello"));
    }

    #[test]
    fn test_token_has_no_newline() {
        let token = encrypt(&"long line ".repeat(500));
        assert!(!token.contains('\n'));
    }

    #[test]
    fn test_bad_base64_fails() {
        assert!(decrypt("not//valid==base64!!!").is_err());
    }

    #[test]
    fn test_truncated_token_fails() {
        let token = encrypt("some message body");
        let truncated = &token[..token.len() / 2];
        assert!(decrypt(truncated).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails_padding() {
        let mut raw = BASE64.decode(encrypt("x")).unwrap();
        let len = raw.len();
        raw[len - 1] ^= 0xFF;
        let tampered = BASE64.encode(raw);
        // Flipping the last ciphertext byte corrupts the PKCS#7 padding with
        // overwhelming probability; at minimum it must not return "x".
        match decrypt(&tampered) {
            Ok(plain) => assert_ne!(plain, "x"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_empty_token_fails() {
        assert!(decrypt("").is_err());
    }
}
