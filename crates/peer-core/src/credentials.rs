//! Random identifiers carried in local descriptions

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::RngCore;

/// Length of the RTCP canonical name
pub const CNAME_LENGTH: usize = 16;

/// Length of the ICE username fragment (RFC 8839 minimum is 4)
pub const ICE_UFRAG_LENGTH: usize = 4;

/// Length of the ICE password (RFC 8839 minimum is 22)
pub const ICE_PASSWORD_LENGTH: usize = 22;

/// Random token of `len` base64 characters
///
/// Base64 only produces `ice-char`s (ALPHA / DIGIT / "+" / "/"), so the
/// result is valid for ICE credentials as is.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut token = STANDARD_NO_PAD.encode(&bytes);
    token.truncate(len);
    token
}

pub fn generate_cname() -> String {
    random_token(CNAME_LENGTH)
}

pub fn generate_ice_ufrag() -> String {
    random_token(ICE_UFRAG_LENGTH)
}

pub fn generate_ice_password() -> String {
    random_token(ICE_PASSWORD_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lengths_and_charset() {
        for token in [generate_cname(), generate_ice_ufrag(), generate_ice_password()] {
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/'));
        }
        assert_eq!(generate_cname().len(), CNAME_LENGTH);
        assert_eq!(generate_ice_ufrag().len(), ICE_UFRAG_LENGTH);
        assert_eq!(generate_ice_password().len(), ICE_PASSWORD_LENGTH);
    }

    #[test]
    fn test_tokens_differ() {
        assert_ne!(generate_ice_password(), generate_ice_password());
    }
}
