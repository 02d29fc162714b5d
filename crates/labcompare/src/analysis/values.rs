use regex::Regex;
use std::sync::LazyLock;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:<=|>=|[<>≤≥~=])?\s*([+-]?\d+(?:[.,]\d+)*)").expect("valid regex")
});

/// Parse the numeric part of a lab value string.
///
/// Handles formats like:
/// - "13.5" -> 13.5
/// - "13.5 g/dL" -> 13.5
/// - "< 0.5" / ">=60" -> 0.5 / 60 (qualifier dropped)
/// - "4,5" -> 4.5 (decimal comma)
/// - "1,200" / "250,000" -> 1200 / 250000 (thousands separator)
/// - "Positive", "", "N/A" -> None
pub fn parse_numeric_value(raw: &str) -> Option<f64> {
    let captures = LEADING_NUMBER.captures(raw)?;
    let token = captures.get(1)?.as_str();
    let normalized = normalize_separators(token);
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn normalize_separators(token: &str) -> String {
    let has_dot = token.contains('.');
    let commas = token.matches(',').count();
    if commas == 0 {
        return token.to_string();
    }
    if has_dot {
        // "1,234.5": commas group thousands.
        return token.replace(',', "");
    }
    let mut parts = token.split(',');
    let integer_part = parts.next().unwrap_or_default();
    let leading_zero = integer_part.trim_start_matches(['+', '-']) == "0";
    let groups_of_three = !leading_zero && parts.all(|group| group.len() == 3);
    if commas > 1 || groups_of_three {
        token.replace(',', "")
    } else {
        token.replace(',', ".")
    }
}
