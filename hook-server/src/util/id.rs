//! Webhook identifier generation.

use rand::rngs::OsRng;
use rand::RngCore;

/// Length of generated webhook identifiers.
pub const DEFAULT_ID_LENGTH: usize = 12;

/// Longest identifier accepted on the public routes.
const MAX_ID_LENGTH: usize = 64;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Bytes at or above this value are discarded so every symbol is equally likely.
const REJECT_FROM: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

/// Generate a random base62 identifier of exactly `length` characters.
///
/// Randomness comes from the operating system. An error here means the
/// environment is broken; callers should fail the operation rather than retry.
pub fn generate_id(length: usize) -> Result<String, rand::Error> {
    let mut id = String::with_capacity(length);
    let mut buf = [0u8; 32];

    while id.len() < length {
        OsRng.try_fill_bytes(&mut buf)?;
        for &byte in buf.iter().filter(|&&b| b < REJECT_FROM) {
            if id.len() == length {
                break;
            }
            id.push(ALPHABET[byte as usize % ALPHABET.len()] as char);
        }
    }

    Ok(id)
}

/// Check the syntactic shape of an identifier received on a route.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LENGTH
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
