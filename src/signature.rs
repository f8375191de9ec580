use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Slack signature version prefix.
pub const SIGNATURE_VERSION: &str = "v0";

/// Maximum allowed clock skew between Slack and us, in either direction.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("missing request timestamp header")]
    MissingTimestamp,
    #[error("request timestamp is not numeric")]
    InvalidTimestamp,
    #[error("request timestamp is {skew_secs}s away from now")]
    StaleTimestamp { skew_secs: u64 },
    #[error("missing signature header")]
    MissingSignature,
    #[error("signature header is not a v0 hex digest")]
    MalformedSignature,
    #[error("signature mismatch")]
    SignatureMismatch,
}

/// What Slack sent us: the two signing headers and the untouched body bytes.
#[derive(Debug, Clone, Copy)]
pub struct VerificationContext<'a> {
    pub signature: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> VerificationContext<'a> {
    pub fn from_headers(headers: &'a HeaderMap, body: &'a [u8]) -> Self {
        Self {
            signature: headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()),
            timestamp: headers.get(TIMESTAMP_HEADER).and_then(|v| v.to_str().ok()),
            body,
        }
    }
}

/// Verify a Slack request signature using HMAC-SHA256.
///
/// Protocol: https://api.slack.com/authentication/verifying-requests-from-slack
///
/// The timestamp window is checked before the digest so a replayed request
/// with a valid signature is still rejected. The digest comparison runs in
/// constant time.
pub fn verify_request(
    ctx: &VerificationContext<'_>,
    signing_secret: &str,
    now: i64,
) -> Result<(), AuthFailure> {
    let timestamp = ctx
        .timestamp
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthFailure::MissingTimestamp)?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| AuthFailure::InvalidTimestamp)?;

    let skew_secs = now.abs_diff(ts);
    if skew_secs > MAX_CLOCK_SKEW_SECS {
        return Err(AuthFailure::StaleTimestamp { skew_secs });
    }

    let signature = ctx.signature.ok_or(AuthFailure::MissingSignature)?;
    let hex_digest = signature
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|rest| rest.strip_prefix('='))
        .ok_or(AuthFailure::MalformedSignature)?;
    let supplied = hex::decode(hex_digest).map_err(|_| AuthFailure::MalformedSignature)?;

    signing_mac(signing_secret, timestamp, ctx.body)
        .verify_slice(&supplied)
        .map_err(|_| AuthFailure::SignatureMismatch)
}

/// Boolean form of [`verify_request`] over raw request parts.
pub fn verify(headers: &HeaderMap, body: &[u8], signing_secret: &str, now: i64) -> bool {
    verify_request(
        &VerificationContext::from_headers(headers, body),
        signing_secret,
        now,
    )
    .is_ok()
}

/// Compute the `v0=<hex>` signature Slack would send for this body.
pub fn compute_signature(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let digest = signing_mac(signing_secret, timestamp, body).finalize();
    format!("{}={}", SIGNATURE_VERSION, hex::encode(digest.into_bytes()))
}

fn signing_mac(signing_secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const NOW: i64 = 1_531_420_618;
    const BODY: &[u8] = br#"{"type":"event_callback","event":{"type":"app_mention"}}"#;

    fn headers(timestamp: &str, signature: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, timestamp.parse().unwrap());
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());
        headers
    }

    fn signed_at(ts: i64) -> HeaderMap {
        let ts = ts.to_string();
        let sig = compute_signature(SECRET, &ts, BODY);
        headers(&ts, &sig)
    }

    #[test]
    fn matches_slack_documented_example() {
        // Example from Slack's request-verification guide.
        let body = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
        let sig = compute_signature(SECRET, "1531420618", body);
        assert_eq!(
            sig,
            "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503"
        );
    }

    #[test]
    fn accepts_valid_request() {
        assert!(verify(&signed_at(NOW), BODY, SECRET, NOW));
    }

    #[test]
    fn accepts_skew_of_exactly_300_seconds_in_both_directions() {
        assert!(verify(&signed_at(NOW - 300), BODY, SECRET, NOW));
        assert!(verify(&signed_at(NOW + 300), BODY, SECRET, NOW));
    }

    #[test]
    fn rejects_skew_of_301_seconds_in_both_directions() {
        let past = signed_at(NOW - 301);
        let ctx = VerificationContext::from_headers(&past, BODY);
        assert_eq!(
            verify_request(&ctx, SECRET, NOW),
            Err(AuthFailure::StaleTimestamp { skew_secs: 301 })
        );
        assert!(!verify(&signed_at(NOW + 301), BODY, SECRET, NOW));
    }

    #[test]
    fn rejects_replayed_request_with_valid_signature() {
        // Ten minutes later the same captured request must no longer pass.
        assert!(!verify(&signed_at(NOW), BODY, SECRET, NOW + 600));
    }

    #[test]
    fn rejects_wrong_secret() {
        let ts = NOW.to_string();
        let sig = compute_signature("some-other-secret", &ts, BODY);
        let ctx_headers = headers(&ts, &sig);
        let ctx = VerificationContext::from_headers(&ctx_headers, BODY);
        assert_eq!(
            verify_request(&ctx, SECRET, NOW),
            Err(AuthFailure::SignatureMismatch)
        );
    }

    #[test]
    fn rejects_tampered_body() {
        assert!(!verify(&signed_at(NOW), b"{\"type\":\"tampered\"}", SECRET, NOW));
    }

    #[test]
    fn rejects_signature_for_a_different_timestamp() {
        let sig = compute_signature(SECRET, &(NOW - 1).to_string(), BODY);
        assert!(!verify(&headers(&NOW.to_string(), &sig), BODY, SECRET, NOW));
    }

    #[test]
    fn rejects_missing_timestamp() {
        let mut h = HeaderMap::new();
        h.insert(SIGNATURE_HEADER, "v0=abc".parse().unwrap());
        let ctx = VerificationContext::from_headers(&h, BODY);
        assert_eq!(
            verify_request(&ctx, SECRET, NOW),
            Err(AuthFailure::MissingTimestamp)
        );
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        let h = headers("yesterday", "v0=abc");
        let ctx = VerificationContext::from_headers(&h, BODY);
        assert_eq!(
            verify_request(&ctx, SECRET, NOW),
            Err(AuthFailure::InvalidTimestamp)
        );
    }

    #[test]
    fn rejects_missing_signature() {
        let mut h = HeaderMap::new();
        h.insert(TIMESTAMP_HEADER, NOW.to_string().parse().unwrap());
        let ctx = VerificationContext::from_headers(&h, BODY);
        assert_eq!(
            verify_request(&ctx, SECRET, NOW),
            Err(AuthFailure::MissingSignature)
        );
    }

    #[test]
    fn rejects_malformed_signatures() {
        for bad in ["abc", "v1=abcd", "v0=not-hex!", "v0abcd"] {
            let h = headers(&NOW.to_string(), bad);
            let ctx = VerificationContext::from_headers(&h, BODY);
            assert_eq!(
                verify_request(&ctx, SECRET, NOW),
                Err(AuthFailure::MalformedSignature),
                "signature {bad:?}"
            );
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let ts = NOW.to_string();
        let sig = compute_signature(SECRET, &ts, BODY);
        let mut h = HeaderMap::new();
        h.insert("X-Slack-Request-Timestamp", ts.parse().unwrap());
        h.insert("X-Slack-Signature", sig.parse().unwrap());
        assert!(verify(&h, BODY, SECRET, NOW));
    }
}
