//! Core types shared by the OTP engines, the URI builder and the verifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Code length used when none is configured.
pub const DEFAULT_DIGITS: u8 = 6;
/// TOTP time-step width used when none is configured.
pub const DEFAULT_PERIOD: u32 = 30;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Algorithm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hash function behind the HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    #[default]
    Sha1,
    Sha256,
    Sha512,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_name())
    }
}

impl Algorithm {
    /// Parse a case-insensitive algorithm name.
    ///
    /// Accepts the `otpauth://` spellings (`SHA1`) as well as the dashed and
    /// `HMAC-` prefixed forms some exporters write.
    pub fn parse(s: &str) -> Result<Self, OtpError> {
        match s.trim().to_uppercase().as_str() {
            "SHA1" | "SHA-1" | "HMACSHA1" | "HMAC-SHA1" => Ok(Self::Sha1),
            "SHA256" | "SHA-256" | "HMACSHA256" | "HMAC-SHA256" => Ok(Self::Sha256),
            "SHA512" | "SHA-512" | "HMACSHA512" | "HMAC-SHA512" => Ok(Self::Sha512),
            _ => Err(OtpError::new(
                OtpErrorKind::UnsupportedAlgorithm,
                format!("Unsupported algorithm: {}", s),
            )),
        }
    }

    /// Name used in the `algorithm=` query parameter.
    pub fn uri_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = OtpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Method
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Bare discriminant of an [`OtpMethod`], as written in the URI host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    Totp,
    Hotp,
}

impl fmt::Display for OtpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Totp => write!(f, "totp"),
            Self::Hotp => write!(f, "hotp"),
        }
    }
}

/// Counter-derivation rule together with the one field it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OtpMethod {
    /// Time-based: the counter is the number of `period`-second steps.
    Totp { period: u32 },
    /// Counter-based: codes start at `initial_count`.
    Hotp { initial_count: u64 },
}

impl Default for OtpMethod {
    fn default() -> Self {
        Self::Totp {
            period: DEFAULT_PERIOD,
        }
    }
}

impl OtpMethod {
    pub fn kind(&self) -> OtpKind {
        match self {
            Self::Totp { .. } => OtpKind::Totp,
            Self::Hotp { .. } => OtpKind::Hotp,
        }
    }

    fn validate(&self) -> Result<(), OtpError> {
        match self {
            Self::Totp { period: 0 } => Err(OtpError::new(
                OtpErrorKind::InvalidParameter,
                "TOTP period must be a positive number of seconds",
            )),
            _ => Ok(()),
        }
    }
}

/// Reject any code length other than 6 or 8.
pub fn check_digits(digits: u8) -> Result<(), OtpError> {
    if digits == 6 || digits == 8 {
        Ok(())
    } else {
        Err(OtpError::new(
            OtpErrorKind::InvalidParameter,
            format!("Digits must be 6 or 8, got {}", digits),
        ))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Metadata
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything an authenticator needs besides the secret.
///
/// Built once at enrollment and read by both code generation and
/// verification, so the two sides can never disagree on parameters. There are
/// no setters; use [`OtpMetadata::new`] to get a validated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMetadata")]
pub struct OtpMetadata {
    method: OtpMethod,
    issuer: String,
    account_name: String,
    algorithm: Algorithm,
    digits: u8,
}

impl OtpMetadata {
    pub fn new(
        method: OtpMethod,
        issuer: impl Into<String>,
        account_name: impl Into<String>,
        algorithm: Algorithm,
        digits: u8,
    ) -> Result<Self, OtpError> {
        method.validate()?;
        check_digits(digits)?;
        Ok(Self {
            method,
            issuer: issuer.into(),
            account_name: account_name.into(),
            algorithm,
            digits,
        })
    }

    /// Default TOTP metadata (SHA1, 6 digits, 30 s).
    pub fn totp(issuer: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            method: OtpMethod::default(),
            issuer: issuer.into(),
            account_name: account_name.into(),
            algorithm: Algorithm::default(),
            digits: DEFAULT_DIGITS,
        }
    }

    pub fn method(&self) -> OtpMethod {
        self.method
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn digits(&self) -> u8 {
        self.digits
    }

    /// "Issuer (account)" or just the account.
    pub fn display_name(&self) -> String {
        if self.issuer.is_empty() {
            self.account_name.clone()
        } else {
            format!("{} ({})", self.issuer, self.account_name)
        }
    }
}

#[derive(Deserialize)]
struct RawMetadata {
    method: OtpMethod,
    issuer: String,
    account_name: String,
    algorithm: Algorithm,
    digits: u8,
}

impl TryFrom<RawMetadata> for OtpMetadata {
    type Error = OtpError;

    fn try_from(raw: RawMetadata) -> Result<Self, Self::Error> {
        Self::new(
            raw.method,
            raw.issuer,
            raw.account_name,
            raw.algorithm,
            raw.digits,
        )
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Provisioning record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of an enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningRecord {
    pub metadata: OtpMetadata,
    /// The `otpauth://` URI (always contains the secret).
    pub uri: String,
    /// Base-32 secret, when the request asked for it.
    pub secret: Option<String>,
    /// Encoded enrollment image (PNG for the default encoder).
    pub enrollment_image: Option<Vec<u8>>,
}

impl ProvisioningRecord {
    /// The enrollment image as a `data:image/png;base64,...` URI.
    pub fn enrollment_data_uri(&self) -> Option<String> {
        use base64::Engine;
        self.enrollment_image.as_ref().map(|png| {
            format!(
                "data:image/png;base64,{}",
                base64::engine::general_purpose::STANDARD.encode(png)
            )
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Verification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inputs to a verification that are not part of the enrollment.
///
/// `counter` is only read for HOTP; `for_time`, `initial_time` and
/// `valid_window` only for TOTP.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    /// HOTP counter, added to the enrollment's `initial_count`.
    pub counter: u64,
    /// Instant to verify for; `None` means now.
    pub for_time: Option<DateTime<Utc>>,
    /// Unix time at which step 0 begins (RFC 6238 `T0`).
    pub initial_time: u64,
    /// Accepted steps on either side of the current one.
    pub valid_window: i32,
}

impl VerifyOptions {
    pub fn at_counter(counter: u64) -> Self {
        Self {
            counter,
            ..Default::default()
        }
    }

    pub fn at_time(for_time: DateTime<Utc>, valid_window: i32) -> Self {
        Self {
            for_time: Some(for_time),
            valid_window,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, valid_window: i32) -> Self {
        self.valid_window = valid_window;
        self
    }
}

/// Detailed verification result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    /// Steps between the matched counter and the expected one (0 = exact).
    pub drift: i64,
    /// Counter that produced the match.
    pub matched_counter: Option<u64>,
}

impl VerifyOutcome {
    pub(crate) fn rejected() -> Self {
        Self {
            valid: false,
            drift: 0,
            matched_counter: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error kind for this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OtpErrorKind {
    /// Out-of-range digits, period, window, length, or time ordering.
    InvalidParameter,
    UnsupportedAlgorithm,
    /// Empty secret, wrong alphabet, or bad padding.
    MalformedSecret,
    /// The enrollment encoder failed.
    EncodingError,
}

/// Crate-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpError {
    pub kind: OtpErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

pub type OtpResult<T> = Result<T, OtpError>;

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)?;
        if let Some(d) = &self.detail {
            write!(f, " ({})", d)?;
        }
        Ok(())
    }
}

impl std::error::Error for OtpError {}

impl OtpError {
    pub fn new(kind: OtpErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::InvalidParameter, msg)
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::MalformedSecret, msg)
    }

    pub(crate) fn encoding(msg: impl Into<String>) -> Self {
        Self::new(OtpErrorKind::EncodingError, msg)
    }
}

impl From<OtpError> for String {
    fn from(e: OtpError) -> String {
        e.to_string()
    }
}
