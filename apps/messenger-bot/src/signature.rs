use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("malformed signature header: {0}")]
    Malformed(String),
    #[error("signature does not match payload")]
    Mismatch,
    #[error("invalid HMAC key")]
    InvalidKey,
}

fn compute(secret: &str, body: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Header value Facebook would send for `body`: `sha1=<hex digest>`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    Ok(format!("sha1={}", hex::encode(compute(secret, body)?)))
}

fn parse(header: &str) -> Result<Vec<u8>, SignatureError> {
    let (method, digest) = header
        .trim()
        .split_once('=')
        .ok_or_else(|| SignatureError::Malformed("expected `sha1=<hex>`".into()))?;
    if !method.eq_ignore_ascii_case("sha1") {
        return Err(SignatureError::Malformed(format!(
            "unsupported method `{method}`"
        )));
    }
    hex::decode(digest).map_err(|err| SignatureError::Malformed(err.to_string()))
}

/// Checks the `x-hub-signature` header against the raw request body.
pub fn verify(secret: &str, header: Option<&str>, body: &[u8]) -> Result<(), SignatureError> {
    let provided = parse(header.ok_or(SignatureError::Missing)?)?;
    let expected = compute(secret, body)?;
    if provided.len() == expected.len() && bool::from(provided.ct_eq(&expected)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}
