//! Webhook signature verification.
//!
//! The claimed signature is the base64-encoded HMAC-SHA256 of the raw request
//! body under the tenant's shared secret. Verification must see the body
//! exactly as it came off the wire, before any JSON parsing.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the claimed signature.
pub const SIGNATURE_HEADER: &str = "x-shopify-hmac-sha256";

/// Compute the base64 signature for `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
  mac.update(body);
  Some(B64.encode(mac.finalize().into_bytes()))
}

/// Check `claimed` against the signature of `body` under `secret`.
///
/// The digest comparison is constant-time. A claim that is not valid base64
/// is rejected without computing anything.
pub fn verify(secret: &str, body: &[u8], claimed: &str) -> bool {
  let Ok(claimed) = B64.decode(claimed.trim()) else {
    return false;
  };
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(body);
  mac.verify_slice(&claimed).is_ok()
}
