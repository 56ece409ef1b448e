//! Key derivation (C2): maps logical identifiers to opaque storage keys.
//!
//! `prefix + base64url(SHA-256(prefix || ":" || part1 || ":" || ...))`,
//! truncated to 32 chars. Not required to be secret — enumeration-resistant,
//! not an authentication mechanism.

use base64::Engine;
use sha2::{Digest, Sha256};

const KEY_SUFFIX_LEN: usize = 32;

fn derive(prefix: &str, parts: &[&str]) -> String {
    let mut input = String::from(prefix);
    for part in parts {
        input.push(':');
        input.push_str(part);
    }
    let digest = Sha256::digest(input.as_bytes());
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    let suffix: String = encoded.chars().take(KEY_SUFFIX_LEN).collect();
    format!("{prefix}{suffix}")
}

pub fn relay_session_key(invite_code: &str, password_hash: &str) -> String {
    derive("sess/", &[invite_code, password_hash])
}

pub fn ack_key(invite_code: &str, password_hash: &str) -> String {
    derive("ack/", &["ack", invite_code, password_hash])
}

pub fn pin_index_key(pin: &str) -> String {
    derive("pin/", &["pin", pin])
}

pub fn peer_key(invite_code: &str) -> String {
    derive("peer/", &["peer", invite_code])
}

pub fn signal_mailbox_key(peer_id: &str) -> String {
    derive("signal/", &["signal", peer_id])
}

pub fn envelope_session_key(session_id: &str) -> String {
    derive("envelope-session/", &[session_id])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_derive_same_key() {
        assert_eq!(
            relay_session_key("Ab3Xy9Zk", "h1"),
            relay_session_key("Ab3Xy9Zk", "h1")
        );
    }

    #[test]
    fn different_password_hashes_derive_different_keys() {
        assert_ne!(
            relay_session_key("Ab3Xy9Zk", "h1"),
            relay_session_key("Ab3Xy9Zk", "h2")
        );
    }

    #[test]
    fn keys_are_namespaced_by_prefix() {
        assert!(relay_session_key("Ab3Xy9Zk", "h1").starts_with("sess/"));
        assert!(ack_key("Ab3Xy9Zk", "h1").starts_with("ack/"));
        assert!(pin_index_key("123456").starts_with("pin/"));
        assert!(peer_key("Ab3Xy9Zk").starts_with("peer/"));
        assert!(signal_mailbox_key("peer-1").starts_with("signal/"));
    }

    #[test]
    fn derived_key_length_is_bounded() {
        let key = relay_session_key("Ab3Xy9Zk", "a-very-long-password-hash-value-indeed");
        assert_eq!(key.len(), "sess/".len() + 32);
    }
}
