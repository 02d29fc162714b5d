/// Normalize a parameter name to its alignment key.
///
/// Lowercase, trim, collapse internal whitespace runs to one space. Nothing
/// else: "Hgb" and "Hemoglobin" stay distinct parameters.
pub fn normalize_parameter_name(raw: &str) -> String {
    collapse_whitespace(raw).to_lowercase()
}

/// Trimmed, whitespace-collapsed name with its original casing.
pub fn display_name(raw: &str) -> String {
    collapse_whitespace(raw)
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unit comparison for the mismatch warning: case and whitespace are ignored.
pub fn same_unit(a: &str, b: &str) -> bool {
    let strip = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    };
    strip(a) == strip(b)
}
