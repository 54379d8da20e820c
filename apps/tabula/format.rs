const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;
const THOUSAND: f64 = 1_000.0;

const UNITS: [(f64, char); 3] = [(THOUSAND, 'K'), (MILLION, 'M'), (BILLION, 'B')];

/// Human readable count for prompts and summaries: `1.50M`, `12.00K`, `950`.
pub fn format_count(n: u128) -> String {
    let value = n as f64;
    let Some(mut unit) = UNITS.iter().rposition(|(scale, _)| value >= *scale) else {
        return n.to_string();
    };

    let mut mantissa = format!("{:.2}", value / UNITS[unit].0);
    // 999_999 rounds to 1000.00K, print it as 1.00M
    if unit + 1 < UNITS.len() && mantissa.parse::<f64>().is_ok_and(|m| m >= THOUSAND) {
        unit += 1;
        mantissa = format!("{:.2}", value / UNITS[unit].0);
    }

    format!("{mantissa}{}", UNITS[unit].1)
}

/// Same as [`format_count`] for the decimal strings Tally uses for vote and
/// token amounts. Anything that is not an unsigned integer is returned as is.
pub fn format_count_str(raw: &str) -> String {
    match raw.trim().parse::<u128>() {
        Ok(n) => format_count(n),
        Err(_) => raw.to_string(),
    }
}
