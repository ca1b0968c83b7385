//! Canonicalization between RFC-1123 resource names and the identifier
//! language the generated runtime configuration targets.
//!
//! The runtime's identifiers (app names, tool names) cannot contain a `/` or,
//! in some target conventions, a `-`. The mapping below is the single place
//! that encodes the escape so the Translator and the runtime agree on it.

/// Canonicalize a resource name: lowercase RFC-1123 label, unchanged.
///
/// This exists as a named step (rather than inlining `to_string`) because
/// callers should route every identifier through `canon` before further
/// mapping, even when no transformation is currently applied.
pub fn canon(name: &str) -> String {
    name.to_string()
}

/// Map a canonical identifier to the runtime's token language:
/// `-` becomes `_`, and the namespace separator `/` becomes `__NS__`.
pub fn to_runtime(name: &str) -> String {
    name.replace('/', "__NS__").replace('-', "_")
}

/// Invert [`to_runtime`]. Lossless given an RFC-1123 input name, since `_`
/// never occurs in a valid RFC-1123 label and so can only have come from a
/// `-` or (as part of `__NS__`) a `/`.
pub fn from_runtime(token: &str) -> String {
    token.replace("__NS__", "/").replace('_', "-")
}

/// Returns true if `label` is a valid RFC-1123 DNS label: lowercase
/// alphanumerics and `-`, not starting or ending with `-`, 1-63 chars.
pub fn is_rfc1123_label(label: &str) -> bool {
    if label.is_empty() || label.len() > 63 {
        return false;
    }
    let bytes = label.as_bytes();
    if bytes[0] == b'-' || bytes[bytes.len() - 1] == b'-' {
        return false;
    }
    bytes
        .iter()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
