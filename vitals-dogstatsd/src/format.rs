//! Numeric-to-text conversion for UDP messages.
//!
//! The wire format requires a decimal point even on whole numbers (`1.0`,
//! not `1`). `ryu` already produces the shortest round-trip representation
//! with a decimal point, so it's used directly rather than hand-rolling
//! `{:?}`-style formatting.

/// Formats `value` the way the DogStatsD line protocol expects it.
pub(crate) fn format_float(value: f64) -> String {
    let mut buf = ryu::Buffer::new();
    buf.format(value).to_owned()
}
