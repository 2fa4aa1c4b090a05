use chrono::NaiveDate;

// ── Cell parsers ──────────────────────────────────────────────────────────────

fn is_missing(s: &str) -> bool {
    s.is_empty() || s == "N/A" || s == "-" || s == "—" || s == "--"
}

/// Parse a numeric cell: drop thousands separators, `%` and surrounding space.
/// "1,234.56" → 1234.56 | "45.3%" → 45.3 | "-" → None
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if is_missing(s) {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && *c != '%' && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the holder-table date column: "20250214" primarily, ISO and
/// slash forms as fallbacks.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(d);
    }

    None
}

pub fn normalise_code(s: &str) -> String {
    s.trim().to_uppercase()
}
