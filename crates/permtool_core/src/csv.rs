use crate::error::PermError;
use crate::registry::{
    FieldKind, FieldValue, PermissionRecord, PermissionType, TAB_VISIBILITY_VALUES,
};

/// Decoded records plus any per-row warnings (coerced values and the
/// like). Warnings never fail the parse.
#[derive(Debug, Clone)]
pub struct CsvParseOutcome {
    pub records: Vec<PermissionRecord>,
    pub warnings: Vec<String>,
}

/// Decode delimited text into permission records for one type.
///
/// The header row is matched case-insensitively against the type's
/// required columns. Rows shorter than the header are skipped, not
/// padded; rows without a value in the identity column are dropped
/// silently.
pub fn parse_records(
    text: &str,
    permission_type: PermissionType,
) -> Result<CsvParseOutcome, PermError> {
    let lines: Vec<&str> = text.lines().filter(|line| !line.trim().is_empty()).collect();
    if lines.len() < 2 {
        return Err(PermError::MalformedCsv);
    }

    let header = parse_csv_line(lines[0]);
    let header_lower: Vec<String> = header.iter().map(|col| col.trim().to_lowercase()).collect();

    let spec = permission_type.spec();
    let missing: Vec<String> = spec
        .required_columns
        .iter()
        .filter(|column| !header_lower.contains(&column.to_lowercase()))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PermError::MissingColumns(missing));
    }

    let identity_column = permission_type.identity_column().to_lowercase();
    let mut records = Vec::new();
    let mut warnings = Vec::new();

    for line in &lines[1..] {
        let values = parse_csv_line(line);
        if values.len() < header.len() {
            continue;
        }

        let mut record = PermissionRecord::new(permission_type);
        let mut keep = true;
        for field in spec.schema {
            let column_lower = field.column.to_lowercase();
            let raw = header_lower
                .iter()
                .position(|col| *col == column_lower)
                .and_then(|index| values.get(index))
                .cloned()
                .unwrap_or_default();

            match field.kind {
                FieldKind::Text => {
                    let value = if raw.is_empty() {
                        field.fallback.unwrap_or_default().to_string()
                    } else {
                        raw
                    };
                    if column_lower == identity_column && value.trim().is_empty() {
                        keep = false;
                        break;
                    }
                    record.set(field.tag, FieldValue::Text(value));
                }
                FieldKind::Flag => {
                    record.set(field.tag, FieldValue::Flag(parse_flag(&raw)));
                }
                FieldKind::TabVisibility => {
                    let value = raw.trim();
                    if TAB_VISIBILITY_VALUES.contains(&value) {
                        record.set(field.tag, FieldValue::Text(value.to_string()));
                    } else {
                        warnings.push(format!(
                            "invalid tab visibility value: {value}; using Hidden"
                        ));
                        record.set(field.tag, FieldValue::Text("Hidden".to_string()));
                    }
                }
            }
        }
        if keep {
            records.push(record);
        }
    }

    Ok(CsvParseOutcome { records, warnings })
}

/// Minimal quoted-field line split: `"` toggles the in-quotes flag and
/// is never retained, `,` separates only outside quotes. Doubled quotes
/// inside a quoted field are NOT collapsed to a literal quote; that is
/// an accepted limitation of this codec.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == ',' && !in_quotes {
            values.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    values.push(current);
    values
}

/// Lossy boolean normalization: `true`, `yes`, `1` and `y` (any case)
/// are true, everything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "yes" | "1" | "y"
    )
}

/// Serialize ordered `(column, value)` rows: the header is the union of
/// all columns in first-seen order, absent values emit as empty strings.
pub fn rows_to_csv(rows: &[Vec<(String, String)>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut headers: Vec<&str> = Vec::new();
    for row in rows {
        for (column, _) in row {
            if !headers.contains(&column.as_str()) {
                headers.push(column);
            }
        }
    }

    let mut csv = headers
        .iter()
        .map(|column| escape_csv_field(column))
        .collect::<Vec<_>>()
        .join(",");
    csv.push('\n');

    for row in rows {
        let line = headers
            .iter()
            .map(|header| {
                row.iter()
                    .find(|(column, _)| column == header)
                    .map(|(_, value)| escape_csv_field(value))
                    .unwrap_or_default()
            })
            .collect::<Vec<_>>()
            .join(",");
        csv.push_str(&line);
        csv.push('\n');
    }
    csv
}

pub fn records_to_csv(records: &[PermissionRecord]) -> String {
    let rows: Vec<Vec<(String, String)>> =
        records.iter().map(PermissionRecord::csv_row).collect();
    rows_to_csv(&rows)
}

/// RFC4180-light quoting: a value containing a comma, double quote or
/// newline is wrapped in double quotes with internal quotes doubled.
pub fn escape_csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
