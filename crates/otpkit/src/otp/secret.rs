//! Shared secrets: generation from the OS CSPRNG and the RFC 4648 Base32
//! form authenticator apps exchange them in.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::otp::types::*;

/// Secret length used when none is configured (160 bits).
pub const DEFAULT_SECRET_LENGTH: usize = 20;
/// Shortest secret [`generate_secret`] will produce (128 bits).
pub const MIN_SECRET_LENGTH: usize = 16;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Secret
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw key bytes, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret(Vec<u8>);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

impl Secret {
    /// Fresh random secret of `length_bytes` bytes.
    pub fn generate(length_bytes: usize) -> Result<Self, OtpError> {
        generate_secret(length_bytes)
    }

    /// Wrap already-decoded key bytes. No length policy is applied.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode a Base32 secret. An empty secret is rejected.
    pub fn from_base32(b32: &str) -> Result<Self, OtpError> {
        let bytes = decode_base32(b32)?;
        if bytes.is_empty() {
            return Err(OtpError::malformed("Secret is empty"));
        }
        Ok(Self(bytes))
    }

    pub fn to_base32(&self) -> String {
        encode_base32(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Secret {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Generate a random secret from the operating system's CSPRNG.
///
/// Fails with `InvalidParameter` below [`MIN_SECRET_LENGTH`].
pub fn generate_secret(length_bytes: usize) -> Result<Secret, OtpError> {
    if length_bytes < MIN_SECRET_LENGTH {
        log::warn!(
            "refusing to generate a {}-bit secret (minimum {} bits)",
            length_bytes * 8,
            MIN_SECRET_LENGTH * 8
        );
        return Err(OtpError::invalid(format!(
            "Secret length must be at least {} bytes, got {}",
            MIN_SECRET_LENGTH, length_bytes
        )));
    }
    let mut buf = vec![0u8; length_bytes];
    OsRng.fill_bytes(&mut buf);
    log::debug!("generated {}-byte secret", length_bytes);
    Ok(Secret(buf))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Base32 codec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Encode raw bytes to base-32 (no padding, uppercase).
pub fn encode_base32(bytes: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648 { padding: false }, bytes)
}

/// Decode a base-32 secret.
///
/// Spaces and dashes are dropped and lowercase is accepted, since apps show
/// secrets grouped ("JBSW Y3DP ..."). Padding is optional but must be exact
/// when present.
pub fn decode_base32(b32: &str) -> Result<Vec<u8>, OtpError> {
    let cleaned: String = b32
        .chars()
        .filter(|c| *c != ' ' && *c != '-')
        .collect::<String>()
        .to_ascii_uppercase();

    let body = strip_padding(&cleaned)?;

    if let Some(bad) = body.chars().find(|c| !matches!(c, 'A'..='Z' | '2'..='7')) {
        return Err(OtpError::malformed("Invalid base-32 secret")
            .with_detail(format!("unexpected character {:?}", bad)));
    }
    // 1, 3 and 6 trailing characters cannot come from whole bytes.
    if matches!(body.len() % 8, 1 | 3 | 6) {
        return Err(OtpError::malformed("Invalid base-32 secret")
            .with_detail(format!("truncated final group ({} chars)", body.len())));
    }
    if body.is_empty() {
        return Ok(Vec::new());
    }

    base32::decode(base32::Alphabet::Rfc4648 { padding: false }, body)
        .ok_or_else(|| OtpError::malformed("Invalid base-32 secret"))
}

/// Validate and remove trailing `=` padding.
fn strip_padding(s: &str) -> Result<&str, OtpError> {
    let body = s.trim_end_matches('=');
    let pad = s.len() - body.len();
    if pad == 0 {
        return Ok(body);
    }
    if body.contains('=') {
        return Err(OtpError::malformed("Invalid base-32 padding")
            .with_detail("'=' inside the encoded body"));
    }
    // Legal pad runs for final groups of 2, 4, 5 and 7 characters.
    let expected = match body.len() % 8 {
        2 => 6,
        4 => 4,
        5 => 3,
        7 => 1,
        _ => 0,
    };
    if pad != expected || s.len() % 8 != 0 {
        return Err(OtpError::malformed("Invalid base-32 padding")
            .with_detail(format!("{} padding characters", pad)));
    }
    Ok(body)
}

/// Check if a string looks like a valid, non-empty base-32 secret.
pub fn is_valid_base32(s: &str) -> bool {
    matches!(decode_base32(s), Ok(bytes) if !bytes.is_empty())
}
