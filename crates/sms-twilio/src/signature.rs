//! Twilio request signing.
//!
//! The signature is HMAC-SHA1, keyed by the account auth token, over the full
//! webhook URL followed by every POST parameter as `name` + `value`, sorted by
//! name. The digest is sent base64-encoded in `X-Twilio-Signature`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sms_core::SmsError;
use url::form_urlencoded;

type HmacSha1 = Hmac<Sha1>;

fn signed_mac(auth_token: &str, url: &str, body: &[u8]) -> Result<HmacSha1, SmsError> {
    let mut params: Vec<(String, String)> = form_urlencoded::parse(body).into_owned().collect();
    params.sort();

    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())
        .map_err(|e| SmsError::Unexpected(format!("hmac key: {}", e)))?;
    mac.update(url.as_bytes());
    for (name, value) in &params {
        mac.update(name.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(mac)
}

/// Compute the base64 signature Twilio would send for this request.
pub fn compute(auth_token: &str, url: &str, body: &[u8]) -> Result<String, SmsError> {
    let mac = signed_mac(auth_token, url, body)?;
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Check `provided` against the expected signature in constant time.
pub fn verify(auth_token: &str, url: &str, body: &[u8], provided: &str) -> Result<(), SmsError> {
    let provided = STANDARD
        .decode(provided.trim())
        .map_err(|_| SmsError::Auth("malformed signature".into()))?;
    signed_mac(auth_token, url, body)?
        .verify_slice(&provided)
        .map_err(|_| SmsError::Auth("signature mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://relay.example/twilio-reply";

    #[test]
    fn parameter_order_does_not_matter() {
        let a = compute("token", URL, b"From=%2B1555&Body=c&To=%2B1666").unwrap();
        let b = compute("token", URL, b"To=%2B1666&Body=c&From=%2B1555").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn signature_matches_manual_hmac() {
        let mut mac = HmacSha1::new_from_slice(b"token").unwrap();
        mac.update(format!("{URL}Bodyc").as_bytes());
        let expected = STANDARD.encode(mac.finalize().into_bytes());
        assert_eq!(compute("token", URL, b"Body=c").unwrap(), expected);
    }

    #[test]
    fn tampered_body_is_rejected() {
        let sig = compute("token", URL, b"Body=c").unwrap();
        assert!(verify("token", URL, b"Body=c", &sig).is_ok());
        assert!(matches!(
            verify("token", URL, b"Body=d", &sig),
            Err(SmsError::Auth(_))
        ));
    }

    #[test]
    fn wrong_url_or_token_is_rejected() {
        let sig = compute("token", URL, b"Body=c").unwrap();
        assert!(verify("token", "https://other.example/", b"Body=c", &sig).is_err());
        assert!(verify("other", URL, b"Body=c", &sig).is_err());
    }

    #[test]
    fn garbage_signature_is_rejected() {
        assert!(matches!(
            verify("token", URL, b"Body=c", "not base64!!"),
            Err(SmsError::Auth(_))
        ));
    }
}
