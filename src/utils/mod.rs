//! Query-parameter helpers shared by the handlers and the resolver.

use std::num::ParseIntError;

/// Lenient integer coercion: empty, unparseable and zero values all read as
/// absent.
pub fn coerce_positive(raw: Option<&str>) -> Option<u32> {
    raw.map(str::trim)
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
}

/// Strict variant for request validation. `Ok(None)` when the parameter is
/// missing, blank or zero, an error when it is present but not an integer.
/// Negative values pass through; they simply match no verse.
pub fn parse_optional(raw: Option<&str>) -> Result<Option<i64>, ParseIntError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse::<i64>().map(|n| (n != 0).then_some(n)),
    }
}

/// Strips the UTF-8 byte order mark some spreadsheet exports prepend.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}
