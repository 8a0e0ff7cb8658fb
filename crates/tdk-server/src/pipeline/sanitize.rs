//! Column name sanitization
//!
//! Maps raw header names to identifiers the database accepts unchanged:
//! alphanumerics and `_` only, never starting with a digit, at most
//! [`MAX_IDENTIFIER_LEN`] characters, uppercase.
//!
//! Two headers may map to the same identifier (`a b` and `a-b`); that is
//! surfaced by the provisioner when the table is created.

/// Longest identifier produced
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Prefix for names that would otherwise start with a digit
pub const DIGIT_PREFIX: &str = "C_";

/// Sanitize one raw column name
///
/// ```
/// use tdk_server::pipeline::sanitize::sanitize_column;
///
/// assert_eq!(sanitize_column("1id"), "C_1ID");
/// assert_eq!(sanitize_column("na me!"), "NA_ME_");
/// ```
pub fn sanitize_column(name: &str) -> String {
    // Uppercase first: it can lengthen a name ('ß' -> "SS") or emit combining marks
    let replaced: String = name
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    // An empty name gets the prefix alone so the identifier is never empty
    let prefixed = match replaced.chars().next() {
        Some(first) if !first.is_numeric() => replaced,
        _ => format!("{}{}", DIGIT_PREFIX, replaced),
    };

    prefixed.chars().take(MAX_IDENTIFIER_LEN).collect()
}

/// Sanitize every header entry, preserving order
pub fn sanitize_columns<S: AsRef<str>>(header: &[S]) -> Vec<String> {
    header.iter().map(|name| sanitize_column(name.as_ref())).collect()
}
