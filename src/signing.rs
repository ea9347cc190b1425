//! Artifact signature verification.
//!
//! When the settings document carries a public key, every patch must come
//! with a signature over its checksum, and a patch that fails the check is
//! treated exactly like a checksum mismatch: discarded, never bootable.
//!
//! The key is a DER, base64-encoded RSA public key. Given a
//! `public_key.pem`, it can be produced with:
//!
//! ```text
//! openssl rsa -pubin -in public_key.pem -inform PEM \
//!   -RSAPublicKey_out -outform DER -out public_key.der
//! base64 public_key.der
//! ```

use crate::error::{Error, Result};
use base64::Engine;
use tracing::{debug, info};

/// Verifies `signature` (base64) over `message` with the given base64 DER
/// RSA public key, using PKCS#1 v1.5 padding and SHA-256.
pub fn check_signature(message: &str, signature: &str, public_key: &str) -> Result<()> {
    let public_key_bytes = base64::prelude::BASE64_STANDARD
        .decode(public_key)
        .map_err(|e| Error::Config {
            field: "patch_public_key".to_string(),
            reason: format!("not valid base64: {e}"),
        })?;
    let decoded_signature = base64::prelude::BASE64_STANDARD
        .decode(signature)
        .map_err(|e| Error::Signature(format!("signature is not valid base64: {e}")))?;

    let key = ring::signature::UnparsedPublicKey::new(
        &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        public_key_bytes,
    );

    debug!("verifying signature over {message}");
    match key.verify(message.as_bytes(), &decoded_signature) {
        Ok(()) => {
            info!("patch signature is valid");
            Ok(())
        }
        // ring's verify error is deliberately unspecific; nothing useful
        // to attach here.
        Err(_) => Err(Error::Signature("signature does not match".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test vectors: MESSAGE signed with the private half of PUBLIC_KEY via
    // openssl; SIGNATURE is the base64 of the raw RSA signature.

    const PUBLIC_KEY: &str = "MIIBCgKCAQEA2wdpEGbuvlPsb9i0qYrfMefJnEw1BHTi8SYZTKrXOvJWmEpPE1hWfbkvYzXu5a96gV1yocF3DMwn04VmRlKhC4AhsD0NL0UNhYhotbKG91Kwi1vAXpHhCdz5gQEBw0K1uB4Jz+zK6WK+31PryYpwLwbyXNqXoY8IAAUQ4STsHYV5w+BMSi8pepWMRd7DR9RHcbNOZlJvdBQ5NxvB4JN4dRMq8cC73ez1P9d7Dfwv3TWY+he9EmuXLT2UivZSlHIrGBa7MFfqyUe2ro0F7Te/B0si12itBbWIqycvqcXjeOPNn6WEpqN7IWjb9LUh162JyYaz5Lb/VeeJX8LKtElccwIDAQAB";

    const MESSAGE: &str = "404e5caa5b906f6d03c97657e8c4d604d759f9cfba1a8bba9d5b49a5ebc174f9";

    const SIGNATURE: &str = "2ixSo5LpaWUSLg2GJEV+D+uyLeLjp0c3vNXnl0yb1iJjAdpn10BFlbcwCcjaJW9PNky2HU2hKOBe62PkFHOU8DDYOfxf2LGg/ToLGPHin85WrwFAceAUYDs7JpQr43dRTbrXcT8k5tuCQOTwXecGwuWcOFFvh0GbXFnyAmi7fLfN9CtTsG2GIOle/LyYLwoviTrXn/fZTZEYrqxD/wZ4QzoWOWLWNvrPbILhqWELkBLhdZeK0+nC2CIxFRYd3bUeOi1AGtPyHKBfdwuf4VO3+HbwJVaAEiD7HU2Bj+Zp1xeSdbznmYgBV86oizrLFd23D+lBfTlmDGgdfNE9J4Z2/g==";

    #[test]
    fn valid_signature_is_accepted() {
        assert!(check_signature(MESSAGE, SIGNATURE, PUBLIC_KEY).is_ok());
    }

    #[test]
    fn wrong_message_is_rejected() {
        let other = "0000000000000000000000000000000000000000000000000000000000000000";
        assert!(matches!(
            check_signature(other, SIGNATURE, PUBLIC_KEY),
            Err(Error::Signature(_))
        ));
    }

    #[test]
    fn undecodable_public_key_is_a_config_error() {
        assert!(matches!(
            check_signature(MESSAGE, SIGNATURE, "not base64!!!"),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn undecodable_signature_is_rejected() {
        assert!(matches!(
            check_signature(MESSAGE, "not base64!!!", PUBLIC_KEY),
            Err(Error::Signature(_))
        ));
    }

    #[test]
    fn mangled_signature_is_rejected() {
        // Valid base64, wrong bits.
        assert!(matches!(
            check_signature(MESSAGE, PUBLIC_KEY, PUBLIC_KEY),
            Err(Error::Signature(_))
        ));
    }
}
