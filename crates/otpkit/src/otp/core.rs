//! Core OTP generation: RFC 4226 (HOTP) and RFC 6238 (TOTP).
//!
//! Everything here works on raw key bytes and plain integers; decoding
//! secrets and reading metadata happens one layer up.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};

use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw HMAC-OTP (RFC 4226 §5.3)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute HMAC(key, message) using the specified algorithm.
fn compute_hmac(key: &[u8], data: &[u8], algo: Algorithm) -> Result<Vec<u8>, OtpError> {
    match algo {
        Algorithm::Sha1 => mac_digest::<Hmac<Sha1>>(key, data),
        Algorithm::Sha256 => mac_digest::<Hmac<Sha256>>(key, data),
        Algorithm::Sha512 => mac_digest::<Hmac<Sha512>>(key, data),
    }
}

fn mac_digest<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>, OtpError> {
    let mut mac = <M as KeyInit>::new_from_slice(key)
        .map_err(|e| OtpError::malformed("Secret rejected by HMAC").with_detail(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Dynamic truncation per RFC 4226 §5.3: the 31-bit value at the offset named
/// by the digest's last nibble.
fn truncate(hmac_result: &[u8]) -> u32 {
    let offset = (hmac_result[hmac_result.len() - 1] & 0x0f) as usize;
    u32::from_be_bytes([
        hmac_result[offset] & 0x7f,
        hmac_result[offset + 1],
        hmac_result[offset + 2],
        hmac_result[offset + 3],
    ])
}

fn format_code(value: u32, digits: u8) -> String {
    let code = value % 10u32.pow(digits as u32);
    format!("{:0>width$}", code, width = digits as usize)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  HOTP (counter-based, RFC 4226)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute an HOTP code for the given raw key bytes and counter.
///
/// # Errors
///
/// - `InvalidParameter` if `digits` is not 6 or 8
/// - `MalformedSecret` if `secret` is empty
pub fn compute_hotp(
    secret: &[u8],
    counter: u64,
    algo: Algorithm,
    digits: u8,
) -> Result<String, OtpError> {
    check_digits(digits)?;
    if secret.is_empty() {
        return Err(OtpError::malformed("Secret is empty"));
    }
    let digest = compute_hmac(secret, &counter.to_be_bytes(), algo)?;
    Ok(format_code(truncate(&digest), digits))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  TOTP (time-based, RFC 6238)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// RFC 6238: T = (unix time - T0) / X.
///
/// Fails with `InvalidParameter` for a zero period or a time before `T0`.
pub fn time_step_at(unix_seconds: u64, period: u32, initial_time: u64) -> Result<u64, OtpError> {
    if period == 0 {
        return Err(OtpError::invalid(
            "TOTP period must be a positive number of seconds",
        ));
    }
    let elapsed = unix_seconds.checked_sub(initial_time).ok_or_else(|| {
        OtpError::invalid("Time precedes the TOTP initial time")
            .with_detail(format!("time={} t0={}", unix_seconds, initial_time))
    })?;
    Ok(elapsed / period as u64)
}

/// Compute a TOTP code at an explicit unix timestamp.
pub fn compute_totp(
    secret: &[u8],
    unix_seconds: u64,
    period: u32,
    initial_time: u64,
    algo: Algorithm,
    digits: u8,
) -> Result<String, OtpError> {
    let step = time_step_at(unix_seconds, period, initial_time)?;
    compute_hotp(secret, step, algo, digits)
}

/// Seconds remaining in the step containing `unix_seconds`.
pub fn seconds_remaining_at(unix_seconds: u64, period: u32) -> u32 {
    if period == 0 {
        return 0;
    }
    let p = period as u64;
    (p - (unix_seconds % p)) as u32
}

/// Current unix timestamp in seconds.
pub fn current_unix_time() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── RFC 4226 test vectors (Appendix D) ───────────────────────

    const RFC_SECRET: &[u8] = b"12345678901234567890";

    #[test]
    fn rfc4226_hotp_vectors() {
        let expected = [
            "755224", "287082", "359152", "969429", "338314",
            "254676", "287922", "162583", "399871", "520489",
        ];
        for (counter, exp) in expected.iter().enumerate() {
            let code = compute_hotp(RFC_SECRET, counter as u64, Algorithm::Sha1, 6).unwrap();
            assert_eq!(&code, exp, "HOTP mismatch at counter {}", counter);
        }
    }

    #[test]
    fn hotp_is_deterministic() {
        let a = compute_hotp(RFC_SECRET, 42, Algorithm::Sha256, 8).unwrap();
        let b = compute_hotp(RFC_SECRET, 42, Algorithm::Sha256, 8).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn hotp_rejects_bad_digits() {
        for digits in [0, 5, 7, 9, 10] {
            let err = compute_hotp(RFC_SECRET, 0, Algorithm::Sha1, digits).unwrap_err();
            assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn hotp_rejects_empty_secret() {
        let err = compute_hotp(b"", 0, Algorithm::Sha1, 6).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::MalformedSecret);
    }

    // ── RFC 6238 test vectors ────────────────────────────────────

    #[test]
    fn rfc6238_totp_sha1() {
        let code = compute_totp(RFC_SECRET, 59, 30, 0, Algorithm::Sha1, 8).unwrap();
        assert_eq!(code, "94287082");
    }

    #[test]
    fn rfc6238_totp_sha256() {
        let key = b"12345678901234567890123456789012";
        let code = compute_totp(key, 59, 30, 0, Algorithm::Sha256, 8).unwrap();
        assert_eq!(code, "46119246");
    }

    #[test]
    fn rfc6238_totp_sha512() {
        let key = b"1234567890123456789012345678901234567890123456789012345678901234";
        let code = compute_totp(key, 59, 30, 0, Algorithm::Sha512, 8).unwrap();
        assert_eq!(code, "90693936");
    }

    #[test]
    fn rfc6238_totp_large_time() {
        let code = compute_totp(RFC_SECRET, 1111111109, 30, 0, Algorithm::Sha1, 8).unwrap();
        assert_eq!(code, "07081804");
    }

    #[test]
    fn rfc6238_totp_20000000000() {
        let code = compute_totp(RFC_SECRET, 20000000000, 30, 0, Algorithm::Sha1, 8).unwrap();
        assert_eq!(code, "65353130");
    }

    #[test]
    fn totp_initial_time_shifts_steps() {
        // With T0 = 30, time 89 falls in step 1, same as time 59 with T0 = 0.
        let shifted = compute_totp(RFC_SECRET, 89, 30, 30, Algorithm::Sha1, 8).unwrap();
        assert_eq!(shifted, "94287082");
    }

    #[test]
    fn totp_rejects_time_before_t0() {
        let err = compute_totp(RFC_SECRET, 10, 30, 11, Algorithm::Sha1, 6).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
    }

    #[test]
    fn totp_rejects_zero_period() {
        let err = compute_totp(RFC_SECRET, 59, 0, 0, Algorithm::Sha1, 6).unwrap_err();
        assert_eq!(err.kind, OtpErrorKind::InvalidParameter);
    }

    // ── Time-step helpers ────────────────────────────────────────

    #[test]
    fn time_step_calculation() {
        assert_eq!(time_step_at(0, 30, 0).unwrap(), 0);
        assert_eq!(time_step_at(29, 30, 0).unwrap(), 0);
        assert_eq!(time_step_at(30, 30, 0).unwrap(), 1);
        assert_eq!(time_step_at(59, 30, 0).unwrap(), 1);
        assert_eq!(time_step_at(60, 30, 0).unwrap(), 2);
    }

    #[test]
    fn seconds_remaining_calculation() {
        assert_eq!(seconds_remaining_at(0, 30), 30);
        assert_eq!(seconds_remaining_at(1, 30), 29);
        assert_eq!(seconds_remaining_at(29, 30), 1);
        assert_eq!(seconds_remaining_at(30, 30), 30);
    }

    #[test]
    fn format_code_pads_with_zeros() {
        assert_eq!(format_code(7_081_804, 8), "07081804");
        assert_eq!(format_code(42, 6), "000042");
    }
}
