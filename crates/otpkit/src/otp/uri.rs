//! `otpauth://` URI generation and parsing per the Google Authenticator
//! key-URI format:
//! <https://github.com/google/google-authenticator/wiki/Key-Uri-Format>
//!
//! Format: `otpauth://totp/ISSUER:ACCOUNT?secret=BASE32&issuer=ISSUER&algorithm=SHA256&digits=8&period=60`
//!
//! `algorithm`, `digits` and `period` are written only when they differ from
//! the implicit SHA1 / 6 / 30. HOTP URIs always carry `counter`.

use crate::otp::secret::{self, Secret};
use crate::otp::types::*;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Generate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the provisioning URI for `metadata` and an encoded secret.
pub fn build_uri(metadata: &OtpMetadata, secret_b32: &str) -> String {
    let account = urlencoding::encode(metadata.account_name());
    let issuer = metadata.issuer();

    let path = if issuer.is_empty() {
        account.into_owned()
    } else {
        format!("{}:{}", urlencoding::encode(issuer), account)
    };

    let mut params = vec![format!("secret={}", secret_b32)];

    if !issuer.is_empty() {
        params.push(format!("issuer={}", urlencoding::encode(issuer)));
    }

    if metadata.algorithm() != Algorithm::Sha1 {
        params.push(format!("algorithm={}", metadata.algorithm().uri_name()));
    }

    if metadata.digits() != DEFAULT_DIGITS {
        params.push(format!("digits={}", metadata.digits()));
    }

    match metadata.method() {
        OtpMethod::Totp { period } if period != DEFAULT_PERIOD => {
            params.push(format!("period={}", period));
        }
        OtpMethod::Totp { .. } => {}
        OtpMethod::Hotp { initial_count } => {
            params.push(format!("counter={}", initial_count));
        }
    }

    format!(
        "otpauth://{}/{}?{}",
        metadata.method().kind(),
        path,
        params.join("&")
    )
}

/// Build the provisioning URI straight from a [`Secret`].
pub fn build_uri_for_secret(metadata: &OtpMetadata, secret: &Secret) -> String {
    build_uri(metadata, &secret.to_base32())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Parse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A decoded provisioning URI.
#[derive(Debug, Clone)]
pub struct ParsedUri {
    pub metadata: OtpMetadata,
    pub secret: Secret,
}

/// Parse an `otpauth://` URI.
///
/// Unknown query parameters (`image`, `color`, ...) are ignored. The
/// `issuer` parameter takes precedence over the label prefix.
pub fn parse_uri(uri: &str) -> Result<ParsedUri, OtpError> {
    let url = url::Url::parse(uri)
        .map_err(|e| OtpError::invalid("Invalid URI").with_detail(e.to_string()))?;

    if url.scheme() != "otpauth" {
        return Err(OtpError::invalid(format!(
            "Expected scheme 'otpauth', got '{}'",
            url.scheme()
        )));
    }

    let kind = match url.host_str() {
        Some("totp") => OtpKind::Totp,
        Some("hotp") => OtpKind::Hotp,
        other => {
            return Err(OtpError::invalid(format!("Unknown OTP type: {:?}", other)));
        }
    };

    // Path is "/ACCOUNT" or "/ISSUER:ACCOUNT". Split on the literal colon
    // before decoding so an encoded one ("%3A") stays inside its half.
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    let (raw_issuer, raw_account) = match path.split_once(':') {
        Some((iss, acct)) => (Some(iss), acct),
        None => (None, path),
    };
    let path_issuer = raw_issuer.map(decode_label).transpose()?;
    let mut account = decode_label(raw_account)?;

    let mut secret_b32 = None;
    let mut param_issuer = None;
    let mut algorithm = Algorithm::default();
    let mut digits = DEFAULT_DIGITS;
    let mut period = DEFAULT_PERIOD;
    let mut counter = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "secret" => secret_b32 = Some(value.into_owned()),
            "issuer" => param_issuer = Some(value.into_owned()),
            "algorithm" => algorithm = Algorithm::parse(&value)?,
            "digits" => digits = parse_number(&key, &value)?,
            "period" => period = parse_number(&key, &value)?,
            "counter" => counter = Some(parse_number(&key, &value)?),
            _ => {}
        }
    }

    let secret_b32 =
        secret_b32.ok_or_else(|| OtpError::invalid("Missing 'secret' parameter"))?;
    let secret = Secret::from_base32(&secret_b32)?;

    let method = match kind {
        OtpKind::Totp => OtpMethod::Totp { period },
        OtpKind::Hotp => OtpMethod::Hotp {
            initial_count: counter
                .ok_or_else(|| OtpError::invalid("HOTP URI is missing 'counter'"))?,
        },
    };

    // Some issuers encode the separator too ("Example%3Aalice"); honour that
    // only when the `issuer` parameter confirms the prefix.
    let path_issuer = match (path_issuer, param_issuer.as_deref()) {
        (None, Some(param)) if !param.is_empty() => {
            match account.strip_prefix(param).and_then(|rest| rest.strip_prefix(':')) {
                Some(rest) => {
                    account = rest.to_string();
                    Some(param.to_string())
                }
                None => None,
            }
        }
        (found, _) => found,
    };

    let issuer = param_issuer.or(path_issuer).unwrap_or_default();
    let metadata = OtpMetadata::new(method, issuer, account, algorithm, digits)?;

    Ok(ParsedUri { metadata, secret })
}

fn decode_label(raw: &str) -> Result<String, OtpError> {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .map_err(|e| OtpError::invalid("Label is not valid UTF-8").with_detail(e.to_string()))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, OtpError> {
    value
        .parse()
        .map_err(|_| OtpError::invalid(format!("Invalid '{}' value: {}", key, value)))
}

/// Re-encode a parsed secret in canonical form.
pub fn canonical_secret(b32: &str) -> Result<String, OtpError> {
    Ok(secret::encode_base32(&secret::decode_base32(b32)?))
}
