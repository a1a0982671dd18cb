use axum::http::HeaderMap;
use ring::hmac;

use crate::errors::AppError;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Requests older or newer than this are rejected as replays.
const MAX_CLOCK_SKEW_SECS: u64 = 60 * 5;

pub fn sign(signing_secret: &str, timestamp: i64, body: &str) -> String {
    let sig_basestring = format!("v0:{}:{}", timestamp, body);
    let key = hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes());
    format!("v0={}", hex::encode(hmac::sign(&key, sig_basestring.as_bytes()).as_ref()))
}

pub fn verify_slack_request(signing_secret: &str, timestamp: &str, signature: &str, body: &str, now: i64) -> Result<(), AppError> {
    let timestamp: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| AppError::Verification(format!("invalid request timestamp `{}`", timestamp)))?;

    if now.abs_diff(timestamp) > MAX_CLOCK_SKEW_SECS {
        return Err(AppError::Verification(format!("request timestamp {} is too far from {}", timestamp, now)));
    }

    let provided = signature
        .strip_prefix("v0=")
        .and_then(|hex_signature| hex::decode(hex_signature).ok())
        .ok_or_else(|| AppError::Verification("malformed request signature".to_string()))?;

    let sig_basestring = format!("v0:{}:{}", timestamp, body);
    let key = hmac::Key::new(hmac::HMAC_SHA256, signing_secret.as_bytes());

    hmac::verify(&key, sig_basestring.as_bytes(), &provided)
        .map_err(|_| AppError::Verification("request signature doesn't match".to_string()))
}

pub fn verify_headers(signing_secret: &str, headers: &HeaderMap, body: &str, now: i64) -> Result<(), AppError> {
    let timestamp = header(headers, TIMESTAMP_HEADER)?;
    let signature = header(headers, SIGNATURE_HEADER)?;

    verify_slack_request(signing_secret, timestamp, signature, body, now)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AppError> {
    headers
        .get(name)
        .ok_or_else(|| AppError::Verification(format!("missing {} header", name)))?
        .to_str()
        .map_err(|_| AppError::Verification(format!("{} header is not valid ASCII", name)))
}
