//! Scrub known secret values out of free-form text
//!
//! Provider error bodies and transport errors sometimes echo back the request
//! that produced them. Anything that leaves a tool handler as text goes through
//! `redact_secrets` with the live token values first.

pub const REDACTION: &str = "[REDACTED]";

/// Replace every occurrence of each secret in `text` with `[REDACTED]`.
///
/// Longer secrets are replaced first so a secret that contains another one is
/// removed whole. Any non-empty value is masked, however short: a token must
/// not reach the output even if masking it also hits unrelated text.
pub fn redact_secrets<S: AsRef<str>>(text: &str, secrets: &[S]) -> String {
    let mut ordered: Vec<&str> = secrets
        .iter()
        .map(AsRef::as_ref)
        .filter(|s| !s.is_empty())
        .collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut out = text.to_owned();
    for secret in ordered {
        if out.contains(secret) {
            out = out.replace(secret, REDACTION);
        }
    }
    out
}
