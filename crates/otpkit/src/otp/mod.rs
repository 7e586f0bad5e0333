//! OTP crate: sub-modules.

pub mod types;
pub mod secret;
pub mod core;
pub mod uri;
pub mod qr;
pub mod verify;
pub mod provision;

// Re-export top-level items for convenience.
pub use types::*;
pub use secret::{decode_base32, encode_base32, generate_secret, Secret};
pub use qr::{EncoderOptions, EnrollmentEncoder, ErrorCorrection, LogoOptions, QrPngEncoder};
pub use provision::{
    build_provisioning_record, build_provisioning_record_with, generate_code, verify_code,
    CodeMoment, ProvisioningRequest,
};
