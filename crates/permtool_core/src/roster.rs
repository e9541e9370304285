use std::collections::HashSet;

use crate::csv::{escape_csv_field, parse_csv_line};
use crate::error::PermError;

/// Result of a roster filtering pass.
#[derive(Debug, Clone)]
pub struct RosterReport {
    pub csv: String,
    pub removed: usize,
    pub remaining: usize,
}

/// Split a comma- or newline-separated email list, trimmed and
/// lower-cased, blanks dropped.
pub fn parse_email_list(text: &str) -> Vec<String> {
    text.split([',', '\n', '\r'])
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

/// Remove roster rows whose username matches any of the given emails,
/// case-insensitively. The username column is the header named
/// `Username` (any case), falling back to the first column.
pub fn filter_roster(csv_text: &str, emails: &[String]) -> Result<RosterReport, PermError> {
    if emails.is_empty() {
        return Err(PermError::EmptyInput);
    }

    let lines: Vec<&str> = csv_text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(PermError::MalformedCsv);
    }

    let header = parse_csv_line(lines[0]);
    let username_index = header
        .iter()
        .position(|column| column.trim().eq_ignore_ascii_case("username"))
        .unwrap_or(0);
    let targets: HashSet<&str> = emails.iter().map(String::as_str).collect();

    let mut csv = header
        .iter()
        .map(|column| escape_csv_field(column))
        .collect::<Vec<_>>()
        .join(",");
    csv.push('\n');

    let mut removed = 0;
    let mut remaining = 0;
    for line in &lines[1..] {
        let mut values = parse_csv_line(line);
        let username = values
            .get(username_index)
            .map(|value| value.trim().to_lowercase())
            .unwrap_or_default();
        if targets.contains(username.as_str()) {
            removed += 1;
            continue;
        }
        values.resize(header.len(), String::new());
        csv.push_str(
            &values
                .iter()
                .map(|value| escape_csv_field(value))
                .collect::<Vec<_>>()
                .join(","),
        );
        csv.push('\n');
        remaining += 1;
    }

    Ok(RosterReport {
        csv,
        removed,
        remaining,
    })
}
