//! Secure random number generation.
//!
//! Uses the operating system's cryptographic random source via `rand`.

use rand::RngCore;

/// Fill a buffer with cryptographically secure random bytes.
pub fn fill_random(buf: &mut [u8]) {
    rand::thread_rng().fill_bytes(buf);
}

/// Generate a fixed-size array of cryptographically secure random bytes.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    fill_random(&mut buf);
    buf
}

/// Opaque single-use token: `<prefix>:<hex millis>:<hex random>`.
///
/// Consumers treat the value as opaque; nothing parses it back.
pub fn opaque_token(prefix: &str) -> String {
    let entropy: [u8; 8] = random_bytes();
    format!(
        "{prefix}:{:x}:{}",
        crate::time::now_millis(),
        hex::encode(entropy)
    )
}
