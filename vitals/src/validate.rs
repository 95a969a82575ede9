//! Name and label-name validation rules.
//!
//! Applied at registration time only. Hand-rolled rather than regex-based
//! since the grammar is small and fixed: `^[A-Za-z_:][A-Za-z0-9_:]*$`,
//! 1..=200 bytes, ASCII-only.

const MAX_NAME_LEN: usize = 200;

/// Validates a metric or label name against the naming grammar.
///
/// Returns `Err` with a short, static reason on failure.
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("name must not be empty");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name exceeds 200 characters");
    }
    if !name.is_ascii() {
        return Err("name must be ASCII");
    }

    let mut chars = name.chars();
    let first = chars.next().expect("checked non-empty above");
    if !(first.is_ascii_alphabetic() || first == '_' || first == ':') {
        return Err("name must start with a letter, underscore, or colon");
    }
    // Label/metric names observed in practice (e.g. `_internal`) start
    // with underscore or colon, so the first-character set matches the
    // rest of the grammar rather than letters only.
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_' || c == ':') {
            return Err("name must match ^[A-Za-z_:][A-Za-z0-9_:]*$");
        }
    }

    Ok(())
}
