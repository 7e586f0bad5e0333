//! # otpkit – HOTP / TOTP provisioning and verification
//!
//! - **RFC 4226 / 6238** – HOTP & TOTP generation with SHA-1, SHA-256, SHA-512
//! - **Secrets** – CSPRNG generation and RFC 4648 Base32 encoding
//! - **otpauth:// URIs** – Generation & parsing in the Google Authenticator key-URI format
//! - **Enrollment images** – QR codes rendered to PNG, with optional logo
//! - **Verification** – Constant-time comparison with a clock-drift window

pub mod otp;

pub use otp::types::*;
pub use otp::{
    build_provisioning_record, build_provisioning_record_with, decode_base32, encode_base32,
    generate_code, generate_secret, verify_code, CodeMoment, EncoderOptions, EnrollmentEncoder,
    ErrorCorrection, LogoOptions, ProvisioningRequest, QrPngEncoder, Secret,
};
