//! Code verification with a clock-drift window.
//!
//! TOTP candidates are checked against the steps `c0 - w ..= c0 + w` in
//! ascending order and the first match wins. HOTP candidates are checked
//! against exactly one counter; advancing it is the caller's job.

use subtle::ConstantTimeEq;

use crate::otp::core;
use crate::otp::secret::Secret;
use crate::otp::types::*;

/// Verify `candidate` and report only whether it matched.
pub fn verify(
    candidate: &str,
    secret: &Secret,
    metadata: &OtpMetadata,
    options: &VerifyOptions,
) -> Result<bool, OtpError> {
    verify_detailed(candidate, secret, metadata, options).map(|outcome| outcome.valid)
}

/// Verify `candidate` and report which counter matched.
///
/// A wrong code is `Ok` with `valid == false`. Misconfiguration (bad digits,
/// negative window, empty secret, time before `initial_time`) is an `Err`.
pub fn verify_detailed(
    candidate: &str,
    secret: &Secret,
    metadata: &OtpMetadata,
    options: &VerifyOptions,
) -> Result<VerifyOutcome, OtpError> {
    // Display formatting ("123 456") is not part of the code.
    let candidate: String = candidate.chars().filter(|c| *c != ' ').collect();
    if candidate.is_empty() {
        return Ok(VerifyOutcome::rejected());
    }
    if options.valid_window < 0 {
        return Err(OtpError::invalid(format!(
            "Verification window must be >= 0, got {}",
            options.valid_window
        )));
    }
    check_digits(metadata.digits())?;
    if secret.is_empty() {
        return Err(OtpError::malformed("Secret is empty"));
    }

    match metadata.method() {
        OtpMethod::Hotp { initial_count } => {
            let counter = initial_count.checked_add(options.counter).ok_or_else(|| {
                OtpError::invalid("HOTP counter overflows u64")
            })?;
            let outcome = if matches_at(&candidate, secret, metadata, counter)? {
                VerifyOutcome {
                    valid: true,
                    drift: 0,
                    matched_counter: Some(counter),
                }
            } else {
                VerifyOutcome::rejected()
            };
            log::debug!("hotp verification at counter {}: {}", counter, outcome.valid);
            Ok(outcome)
        }
        OtpMethod::Totp { period } => {
            let unix_seconds = match options.for_time {
                Some(t) => u64::try_from(t.timestamp()).map_err(|_| {
                    OtpError::invalid("Verification time precedes the unix epoch")
                })?,
                None => core::current_unix_time(),
            };
            let base = core::time_step_at(unix_seconds, period, options.initial_time)?;
            let window = options.valid_window as i64;

            for offset in -window..=window {
                let Some(counter) = offset_counter(base, offset) else {
                    continue;
                };
                if matches_at(&candidate, secret, metadata, counter)? {
                    log::debug!("totp verification matched with drift {}", offset);
                    return Ok(VerifyOutcome {
                        valid: true,
                        drift: offset,
                        matched_counter: Some(counter),
                    });
                }
            }
            log::debug!("totp verification failed within window {}", window);
            Ok(VerifyOutcome::rejected())
        }
    }
}

fn matches_at(
    candidate: &str,
    secret: &Secret,
    metadata: &OtpMetadata,
    counter: u64,
) -> Result<bool, OtpError> {
    let expected = core::compute_hotp(
        secret.as_bytes(),
        counter,
        metadata.algorithm(),
        metadata.digits(),
    )?;
    Ok(constant_time_eq(expected.as_bytes(), candidate.as_bytes()))
}

/// `base + offset`, or `None` when it leaves the `u64` range.
fn offset_counter(base: u64, offset: i64) -> Option<u64> {
    if offset < 0 {
        base.checked_sub(offset.unsigned_abs())
    } else {
        base.checked_add(offset as u64)
    }
}

/// Constant-time comparison; unequal lengths compare unequal.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
