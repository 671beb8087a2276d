//! DTLS identity helpers
//!
//! Media endpoints generate a certificate and report its fingerprint back to the
//! engine. The fingerprint format is the one carried in `a=fingerprint`:
//! uppercase hex octets separated by colons.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{PeerConnectionError, Result};

/// Hash function name that goes with [`certificate_fingerprint`]
pub const FINGERPRINT_HASH_FUNCTION: &str = "sha-256";

/// SHA-256 fingerprint of a PEM encoded certificate
///
/// The PEM armour (`-----BEGIN ...-----` lines) is dropped, the body is base64
/// decoded and the DER bytes are hashed.
pub fn certificate_fingerprint(pem: &str) -> Result<String> {
    let body: String = pem
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();

    if body.is_empty() {
        return Err(PeerConnectionError::operation("certificate PEM has no body"));
    }

    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| PeerConnectionError::operation(format!("certificate is not valid base64: {}", e)))?;

    Ok(fingerprint_bytes(&der))
}

/// SHA-256 fingerprint of raw DER bytes
pub fn fingerprint_bytes(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Wrap DER bytes in PEM armour with 64 character lines
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}

/// Random bytes standing in for a DER certificate in tests and mock endpoints
pub fn random_certificate_der() -> Vec<u8> {
    let mut der = vec![0u8; 256];
    rand::thread_rng().fill_bytes(&mut der);
    der
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint_bytes(b"certificate");
        let octets: Vec<&str> = fp.split(':').collect();
        assert_eq!(octets.len(), 32);
        assert!(octets.iter().all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase())));
    }

    #[test]
    fn test_pem_fingerprint_matches_der() {
        let der = random_certificate_der();
        let pem = to_pem("CERTIFICATE", &der);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert_eq!(certificate_fingerprint(&pem).unwrap(), fingerprint_bytes(&der));
    }

    #[test]
    fn test_known_digest() {
        // SHA-256("abc")
        assert_eq!(
            fingerprint_bytes(b"abc"),
            "BA:78:16:BF:8F:01:CF:EA:41:41:40:DE:5D:AE:22:23:B0:03:61:A3:96:17:7A:9C:B4:10:FF:61:F2:00:15:AD"
        );
    }

    #[test]
    fn test_invalid_pem() {
        assert!(certificate_fingerprint("-----BEGIN CERTIFICATE-----\n-----END CERTIFICATE-----\n").is_err());
        assert!(certificate_fingerprint("-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n").is_err());
    }
}
