use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub fn sha256_hex(message: &[u8]) -> String {
    hex::encode(Sha256::digest(message))
}

pub fn constant_time_eq(expected: &str, provided: &str) -> bool {
    let expected = expected.trim().as_bytes();
    let provided = provided.trim().as_bytes();
    !expected.is_empty() && expected.ct_eq(provided).into()
}
