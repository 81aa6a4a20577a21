use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

/// Headers whose values must never reach a log.
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "x-subversion-token"];

/// svn options whose following argument is a secret.
pub const SENSITIVE_ARGS: &[&str] = &["--password"];

const REDACTED: &str = "[REDACTED]";

pub struct Sanitizer;

impl Sanitizer {
    pub fn is_sensitive_header(header_name: &str) -> bool {
        let lower = header_name.to_lowercase();
        SENSITIVE_HEADERS.contains(&lower.as_str())
    }

    /// Header names and values suitable for logging, sensitive values redacted.
    pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = if Self::is_sensitive_header(name.as_str()) {
                    REDACTED.to_string()
                } else {
                    value.to_str().unwrap_or("<non-ascii>").to_string()
                };
                (name.as_str().to_string(), value)
            })
            .collect()
    }

    /// Copy of an svn argument list with secret option values redacted.
    pub fn sanitize_args(args: &[String]) -> Vec<String> {
        let mut sanitized = Vec::with_capacity(args.len());
        let mut redact_next = false;

        for arg in args {
            if redact_next {
                sanitized.push(REDACTED.to_string());
                redact_next = false;
                continue;
            }
            redact_next = SENSITIVE_ARGS.contains(&arg.as_str());
            sanitized.push(arg.clone());
        }

        sanitized
    }
}
