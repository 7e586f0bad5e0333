//! High-level entry points: enroll a new secret, generate a code, verify a
//! code. Each one reads the method-specific fields from [`OtpMetadata`] so
//! callers never pass period or counter offsets twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::otp::core;
use crate::otp::qr::{EncoderOptions, EnrollmentEncoder, QrPngEncoder};
use crate::otp::secret::{self, Secret, DEFAULT_SECRET_LENGTH};
use crate::otp::types::*;
use crate::otp::uri;
use crate::otp::verify;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Enrollment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything needed to enroll one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisioningRequest {
    pub account_name: String,
    pub issuer: String,
    pub method: OtpMethod,
    pub algorithm: Algorithm,
    pub digits: u8,
    /// Random secret length in bytes.
    pub secret_length: usize,
    /// Copy the Base32 secret into the record (it is always in the URI).
    pub include_secret: bool,
    /// Render an enrollment image for the URI.
    pub include_enrollment_image: bool,
    pub encoder: EncoderOptions,
}

impl Default for ProvisioningRequest {
    fn default() -> Self {
        Self {
            account_name: String::new(),
            issuer: String::new(),
            method: OtpMethod::default(),
            algorithm: Algorithm::default(),
            digits: DEFAULT_DIGITS,
            secret_length: DEFAULT_SECRET_LENGTH,
            include_secret: true,
            include_enrollment_image: false,
            encoder: EncoderOptions::default(),
        }
    }
}

impl ProvisioningRequest {
    /// Default TOTP request for `account_name` at `issuer`.
    pub fn new(account_name: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            issuer: issuer.into(),
            ..Default::default()
        }
    }

    /// Load a request from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, OtpError> {
        serde_json::from_str(json).map_err(|e| {
            OtpError::invalid("Invalid provisioning request").with_detail(e.to_string())
        })
    }

    pub fn with_method(mut self, method: OtpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_algorithm(mut self, algo: Algorithm) -> Self {
        self.algorithm = algo;
        self
    }

    pub fn with_digits(mut self, digits: u8) -> Self {
        self.digits = digits;
        self
    }

    pub fn with_secret_length(mut self, length: usize) -> Self {
        self.secret_length = length;
        self
    }

    pub fn with_enrollment_image(mut self, encoder: EncoderOptions) -> Self {
        self.include_enrollment_image = true;
        self.encoder = encoder;
        self
    }

    pub fn without_secret(mut self) -> Self {
        self.include_secret = false;
        self
    }

    fn metadata(&self) -> Result<OtpMetadata, OtpError> {
        OtpMetadata::new(
            self.method,
            self.issuer.clone(),
            self.account_name.clone(),
            self.algorithm,
            self.digits,
        )
    }
}

/// Enroll using the built-in QR/PNG encoder.
pub fn build_provisioning_record(request: &ProvisioningRequest) -> Result<ProvisioningRecord, OtpError> {
    build_provisioning_record_with(request, &QrPngEncoder)
}

/// Enroll with a caller-supplied encoder.
///
/// Parameters are validated before any randomness is drawn; encoder failures
/// come back unchanged.
pub fn build_provisioning_record_with(
    request: &ProvisioningRequest,
    encoder: &dyn EnrollmentEncoder,
) -> Result<ProvisioningRecord, OtpError> {
    let metadata = request.metadata()?;
    let secret = secret::generate_secret(request.secret_length)?;
    let secret_b32 = secret.to_base32();
    let uri = uri::build_uri(&metadata, &secret_b32);

    let enrollment_image = if request.include_enrollment_image {
        Some(encoder.encode(&uri, &request.encoder)?)
    } else {
        None
    };

    log::debug!(
        "provisioned {} enrollment for {}",
        metadata.method().kind(),
        metadata.display_name()
    );

    Ok(ProvisioningRecord {
        metadata,
        uri,
        secret: request.include_secret.then_some(secret_b32),
        enrollment_image,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Code generation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which code to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMoment {
    /// HOTP: counter relative to the enrollment's `initial_count`.
    Counter(u64),
    /// TOTP: the step containing this instant.
    Time(DateTime<Utc>),
    /// TOTP: the step containing `time`, counting steps from `initial_time`
    /// (unix seconds) instead of the epoch.
    TimeFrom {
        time: DateTime<Utc>,
        initial_time: u64,
    },
    /// TOTP: the current step.
    Now,
}

/// Generate the code for `secret` under `metadata`.
///
/// `moment` must match the method: `Counter` for HOTP, `Time`/`Now` for TOTP.
pub fn generate_code(
    secret: &Secret,
    metadata: &OtpMetadata,
    moment: CodeMoment,
) -> Result<String, OtpError> {
    let algo = metadata.algorithm();
    let digits = metadata.digits();
    match (metadata.method(), moment) {
        (OtpMethod::Hotp { initial_count }, CodeMoment::Counter(count)) => {
            let counter = initial_count
                .checked_add(count)
                .ok_or_else(|| OtpError::invalid("HOTP counter overflows u64"))?;
            core::compute_hotp(secret.as_bytes(), counter, algo, digits)
        }
        (OtpMethod::Totp { period }, CodeMoment::Time(t)) => {
            core::compute_totp(secret.as_bytes(), unix_time(t)?, period, 0, algo, digits)
        }
        (OtpMethod::Totp { period }, CodeMoment::TimeFrom { time, initial_time }) => {
            core::compute_totp(secret.as_bytes(), unix_time(time)?, period, initial_time, algo, digits)
        }
        (OtpMethod::Totp { period }, CodeMoment::Now) => core::compute_totp(
            secret.as_bytes(),
            core::current_unix_time(),
            period,
            0,
            algo,
            digits,
        ),
        (method, moment) => Err(OtpError::invalid(format!(
            "{:?} does not apply to a {} enrollment",
            moment,
            method.kind()
        ))),
    }
}

fn unix_time(t: DateTime<Utc>) -> Result<u64, OtpError> {
    u64::try_from(t.timestamp()).map_err(|_| OtpError::invalid("Time precedes the unix epoch"))
}

/// Verify a presented code. See [`verify::verify`] for the rules.
pub fn verify_code(
    code: &str,
    secret: &Secret,
    metadata: &OtpMetadata,
    options: &VerifyOptions,
) -> Result<bool, OtpError> {
    verify::verify(code, secret, metadata, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Encoder stub that records nothing and returns a fixed payload.
    struct FixedEncoder(Result<Vec<u8>, OtpError>);

    impl EnrollmentEncoder for FixedEncoder {
        fn encode(&self, _payload: &str, _options: &EncoderOptions) -> Result<Vec<u8>, OtpError> {
            self.0.clone()
        }
    }

    // ── Enrollment ───────────────────────────────────────────────

    #[test]
    fn record_defaults() {
        let request = ProvisioningRequest::new("alice@example.com", "Example");
        let record = build_provisioning_record(&request).unwrap();
        let secret = record.secret.as_deref().unwrap();
        assert_eq!(secret.len(), 32); // 20 bytes → 32 base-32 chars
        assert_eq!(
            record.uri,
            format!(
                "otpauth://totp/Example:alice%40example.com?secret={}&issuer=Example",
                secret
            )
        );
        assert!(record.enrollment_image.is_none());
        assert_eq!(record.metadata, OtpMetadata::totp("Example", "alice@example.com"));
    }

    #[test]
    fn record_without_secret_still_has_uri() {
        let request = ProvisioningRequest::new("bob", "Acme").without_secret();
        let record = build_provisioning_record(&request).unwrap();
        assert!(record.secret.is_none());
        assert!(record.uri.contains("secret="));
    }

    #[test]
    fn record_with_image() {
        let request = ProvisioningRequest::new("bob", "Acme")
            .with_enrollment_image(EncoderOptions::default());
        let record = build_provisioning_record(&request).unwrap();
        let png = record.enrollment_image.as_ref().unwrap();
        assert_eq!(&png[..4], b"\x89PNG");
        assert!(record.enrollment_data_uri().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn record_uses_custom_encoder() {
        let request = ProvisioningRequest::new("bob", "Acme")
            .with_enrollment_image(EncoderOptions::default());
        let record =
            build_provisioning_record_with(&request, &FixedEncoder(Ok(vec![7, 7]))).unwrap();
        assert_eq!(record.enrollment_image, Some(vec![7, 7]));
    }

    #[test]
    fn record_surfaces_encoder_error() {
        let request = ProvisioningRequest::new("bob", "Acme")
            .with_enrollment_image(EncoderOptions::default());
        let failure = OtpError::encoding("printer on fire");
        let err = build_provisioning_record_with(&request, &FixedEncoder(Err(failure.clone())))
            .unwrap_err();
        assert_eq!(err, failure);
    }

    #[test]
    fn record_hotp_uri_has_counter() {
        let request = ProvisioningRequest::new("bob", "Acme")
            .with_method(OtpMethod::Hotp { initial_count: 5 })
            .with_algorithm(Algorithm::Sha256)
            .with_digits(8);
        let record = build_provisioning_record(&request).unwrap();
        assert!(record.uri.starts_with("otpauth://hotp/Acme:bob?"));
        assert!(record.uri.ends_with("&algorithm=SHA256&digits=8&counter=5"));
    }

    #[test]
    fn record_rejects_bad_parameters() {
        let cases = [
            ProvisioningRequest::new("a", "I").with_digits(7),
            ProvisioningRequest::new("a", "I").with_method(OtpMethod::Totp { period: 0 }),
            ProvisioningRequest::new("a", "I").with_secret_length(10),
        ];
        for request in cases {
            let err = build_provisioning_record(&request).unwrap_err();
            assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn record_secret_roundtrips_through_uri() {
        let request = ProvisioningRequest::new("carol", "Acme");
        let record = build_provisioning_record(&request).unwrap();
        let parsed = uri::parse_uri(&record.uri).unwrap();
        assert_eq!(Some(parsed.secret.to_base32()), record.secret);
        assert_eq!(parsed.metadata, record.metadata);
    }

    #[test]
    fn request_from_json() {
        let request = ProvisioningRequest::from_json(
            r#"{"account_name":"dave","issuer":"Acme","method":{"type":"hotp","initial_count":2},"digits":8}"#,
        )
        .unwrap();
        assert_eq!(request.method, OtpMethod::Hotp { initial_count: 2 });
        assert_eq!(request.digits, 8);
        assert_eq!(request.secret_length, DEFAULT_SECRET_LENGTH);
        assert!(request.include_secret);

        let err = ProvisioningRequest::from_json("{not json").unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
    }

    // ── Code generation ──────────────────────────────────────────

    fn rfc_secret() -> Secret {
        Secret::from_bytes(b"12345678901234567890".to_vec())
    }

    #[test]
    fn generate_totp_at_time() {
        let meta = OtpMetadata::new(OtpMethod::default(), "I", "a", Algorithm::Sha1, 8).unwrap();
        let t = Utc.timestamp_opt(1111111109, 0).unwrap();
        let code = generate_code(&rfc_secret(), &meta, CodeMoment::Time(t)).unwrap();
        assert_eq!(code, "07081804");
    }

    #[test]
    fn generate_totp_with_initial_time_matches_verify() {
        let meta = OtpMetadata::new(OtpMethod::default(), "I", "a", Algorithm::Sha1, 8).unwrap();
        let time = Utc.timestamp_opt(89, 0).unwrap();
        let moment = CodeMoment::TimeFrom { time, initial_time: 30 };
        // With T0 = 30, time 89 is step 1, same as time 59 counted from the epoch.
        let code = generate_code(&rfc_secret(), &meta, moment).unwrap();
        assert_eq!(code, "94287082");

        let options = VerifyOptions {
            initial_time: 30,
            ..VerifyOptions::at_time(time, 0)
        };
        assert!(verify_code(&code, &rfc_secret(), &meta, &options).unwrap());

        let early = CodeMoment::TimeFrom { time: Utc.timestamp_opt(10, 0).unwrap(), initial_time: 30 };
        let err = generate_code(&rfc_secret(), &meta, early).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
    }

    #[test]
    fn generate_totp_now_verifies() {
        let meta = OtpMetadata::totp("I", "a");
        let code = generate_code(&rfc_secret(), &meta, CodeMoment::Now).unwrap();
        assert!(verify_code(&code, &rfc_secret(), &meta, &VerifyOptions::default().with_window(1))
            .unwrap());
    }

    #[test]
    fn generate_hotp_with_initial_count() {
        let meta = OtpMetadata::new(
            OtpMethod::Hotp { initial_count: 2 },
            "I",
            "a",
            Algorithm::Sha1,
            6,
        )
        .unwrap();
        // 2 + 0 → "359152", 2 + 2 → "338314"
        assert_eq!(generate_code(&rfc_secret(), &meta, CodeMoment::Counter(0)).unwrap(), "359152");
        assert_eq!(generate_code(&rfc_secret(), &meta, CodeMoment::Counter(2)).unwrap(), "338314");
    }

    #[test]
    fn generate_rejects_mismatched_moment() {
        let totp = OtpMetadata::totp("I", "a");
        let err = generate_code(&rfc_secret(), &totp, CodeMoment::Counter(1)).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);

        let hotp = OtpMetadata::new(
            OtpMethod::Hotp { initial_count: 0 },
            "I",
            "a",
            Algorithm::Sha1,
            6,
        )
        .unwrap();
        let err = generate_code(&rfc_secret(), &hotp, CodeMoment::Now).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
    }

    #[test]
    fn generate_rejects_empty_secret() {
        let meta = OtpMetadata::totp("I", "a");
        let err = generate_code(&Secret::from_bytes(Vec::new()), &meta, CodeMoment::Now)
            .unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::MalformedSecret);
    }
}
