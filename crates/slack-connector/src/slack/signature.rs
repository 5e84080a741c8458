//! Slack request signing (`x-slack-signature`, scheme `v0`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::ConnectorError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// Requests older (or newer) than this are rejected as replays.
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Verify a webhook request against the app's signing secret at the current time.
pub fn verify_slack_signature(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
) -> Result<(), ConnectorError> {
    verify_at(
        signing_secret,
        timestamp,
        body,
        signature,
        chrono::Utc::now().timestamp(),
    )
}

/// Verify a request as of `now` (unix seconds).
pub fn verify_at(
    signing_secret: &str,
    timestamp: &str,
    body: &[u8],
    signature: &str,
    now: i64,
) -> Result<(), ConnectorError> {
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| ConnectorError::SignatureInvalid("invalid timestamp".to_string()))?;
    if (now - ts).abs() > MAX_TIMESTAMP_AGE_SECS {
        return Err(ConnectorError::SignatureInvalid(
            "request timestamp too old".to_string(),
        ));
    }

    let expected = sign(signing_secret, timestamp, body)?;
    let expected = expected.as_bytes();
    let actual = signature.as_bytes();
    if expected.len() != actual.len() || expected.ct_eq(actual).unwrap_u8() != 1 {
        return Err(ConnectorError::SignatureInvalid(
            "signature mismatch".to_string(),
        ));
    }

    Ok(())
}

/// `v0=` followed by the hex HMAC-SHA256 of `v0:{timestamp}:{body}`.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> Result<String, ConnectorError> {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .map_err(|e| ConnectorError::Internal(format!("HMAC init failed: {}", e)))?;
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(format!("v0={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const BODY: &[u8] = b"token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J";

    #[test]
    fn valid_signature_passes() {
        let signature = sign(SECRET, "1531420618", BODY).unwrap();
        assert!(verify_at(SECRET, "1531420618", BODY, &signature, 1531420618).is_ok());
    }

    #[test]
    fn signature_with_current_clock() {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(SECRET, &timestamp, BODY).unwrap();
        assert!(verify_slack_signature(SECRET, &timestamp, BODY, &signature).is_ok());
    }

    #[test]
    fn invalid_signature_fails() {
        let bad = "v0=deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
        match verify_at(SECRET, "1531420618", BODY, bad, 1531420618) {
            Err(ConnectorError::SignatureInvalid(msg)) => assert!(msg.contains("mismatch")),
            other => panic!("expected SignatureInvalid, got: {:?}", other),
        }
    }

    #[test]
    fn tampered_body_fails() {
        let signature = sign(SECRET, "1531420618", BODY).unwrap();
        assert!(verify_at(SECRET, "1531420618", b"token=other", &signature, 1531420618).is_err());
    }

    #[test]
    fn old_timestamp_rejected() {
        let signature = sign(SECRET, "1531420618", BODY).unwrap();
        match verify_at(SECRET, "1531420618", BODY, &signature, 1531420618 + 600) {
            Err(ConnectorError::SignatureInvalid(msg)) => assert!(msg.contains("too old")),
            other => panic!("expected SignatureInvalid, got: {:?}", other),
        }
    }

    #[test]
    fn malformed_timestamp_rejected() {
        assert!(verify_at(SECRET, "yesterday", BODY, "v0=00", 0).is_err());
    }
}
