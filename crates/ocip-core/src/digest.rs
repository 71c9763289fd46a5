//! Login digest computation
//!
//! The OCI-P login handshake never sends the password itself. The server
//! issues a nonce, and the client answers with
//! `MD5(nonce + ":" + SHA1(password))`, both digests rendered as lowercase
//! hex.

use md5::{Digest, Md5};
use sha1::Sha1;

/// Compute the `signedPassword` value for a login request
pub fn signed_password(password: &str, nonce: &str) -> String {
    let password_hash = hex::encode(Sha1::digest(password.as_bytes()));
    hex::encode(Md5::digest(format!("{nonce}:{password_hash}").as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_password_golden_vectors() {
        assert_eq!(
            signed_password("secret", "12345"),
            "af7069e0f784b37f264667e67ecc101f"
        );
        assert_eq!(
            signed_password("changeme", "8517382"),
            "93dc6ba28f5f357e514d89ac615422c6"
        );
    }

    #[test]
    fn test_signed_password_depends_on_nonce() {
        assert_ne!(
            signed_password("secret", "12345"),
            signed_password("secret", "12346")
        );
    }
}
