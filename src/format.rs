//! Display helpers shared by API responses: status labels, aspect ratio names
//! and money formatting.

use crate::models::job::JobStatus;

/// Label shown to users for a job status.
pub fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Queued",
        JobStatus::Processing => "Generating",
        JobStatus::Succeeded => "Completed",
        JobStatus::Failed => "Failed",
        JobStatus::Canceled => "Canceled",
    }
}

/// Supported aspect ratios and their display names.
pub const ASPECT_RATIOS: [(&str, &str); 8] = [
    ("1:1", "Square"),
    ("16:9", "Landscape"),
    ("9:16", "Portrait"),
    ("4:3", "Standard"),
    ("3:4", "Portrait 3:4"),
    ("21:9", "Cinematic"),
    ("3:2", "Photo"),
    ("2:3", "Poster"),
];

/// Display name for a ratio such as `"16:9"`. `None` means the ratio is not supported.
pub fn aspect_ratio_name(ratio: &str) -> Option<&'static str> {
    let ratio = ratio.trim();
    ASPECT_RATIOS
        .iter()
        .find(|(r, _)| *r == ratio)
        .map(|(_, name)| *name)
}

/// Format an amount in minor units.
///
/// `format_currency(123456, "USD")` → `"$1,234.56"`. Zero-decimal currencies
/// (JPY) treat `minor` as whole units. Unknown codes are suffixed: `"12.34 CHF"`.
pub fn format_currency(minor: i64, currency: &str) -> String {
    let code = currency.to_ascii_uppercase();
    let (symbol, decimals) = match code.as_str() {
        "USD" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        _ => (None, 2),
    };

    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    let number = if decimals == 0 {
        group_thousands(abs)
    } else {
        format!("{}.{:02}", group_thousands(abs / 100), abs % 100)
    };

    match symbol {
        Some(symbol) => format!("{sign}{symbol}{number}"),
        None => format!("{sign}{number} {code}"),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_cover_every_status() {
        assert_eq!(status_label(JobStatus::Pending), "Queued");
        assert_eq!(status_label(JobStatus::Processing), "Generating");
        assert_eq!(status_label(JobStatus::Succeeded), "Completed");
        assert_eq!(status_label(JobStatus::Failed), "Failed");
        assert_eq!(status_label(JobStatus::Canceled), "Canceled");
    }

    #[test]
    fn aspect_ratio_lookup() {
        assert_eq!(aspect_ratio_name("16:9"), Some("Landscape"));
        assert_eq!(aspect_ratio_name(" 9:16 "), Some("Portrait"));
        assert_eq!(aspect_ratio_name("1:1"), Some("Square"));
        assert_eq!(aspect_ratio_name("5:4"), None);
    }

    #[test]
    fn currency_with_symbol_and_grouping() {
        assert_eq!(format_currency(999, "USD"), "$9.99");
        assert_eq!(format_currency(123_456_789, "usd"), "$1,234,567.89");
        assert_eq!(format_currency(5, "EUR"), "€0.05");
        assert_eq!(format_currency(-2500, "GBP"), "-£25.00");
    }

    #[test]
    fn zero_decimal_and_unknown_currencies() {
        assert_eq!(format_currency(1500, "JPY"), "¥1,500");
        assert_eq!(format_currency(1234, "CHF"), "12.34 CHF");
    }
}
