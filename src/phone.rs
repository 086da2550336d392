//! Phone number normalization for CRM search.

/// Strip a leading `+<country_code>` prefix and every non-digit character.
///
/// Inputs without the `+` form but carrying the country code in front of a
/// full national number (e.g. `15554567890`) are trimmed too. Returns `None`
/// when nothing dialable is left.
pub fn normalize(raw: &str, country_code: &str) -> Option<String> {
    let trimmed = raw.trim();
    let prefix = format!("+{}", country_code);

    let (rest, had_prefix) = match trimmed.strip_prefix(&prefix) {
        Some(rest) => (rest, true),
        None => (trimmed, false),
    };

    let mut digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();

    if !had_prefix
        && !country_code.is_empty()
        && digits.len() == NATIONAL_LEN + country_code.len()
        && digits.starts_with(country_code)
    {
        digits.drain(..country_code.len());
    }

    if digits.is_empty() { None } else { Some(digits) }
}

const NATIONAL_LEN: usize = 10;
