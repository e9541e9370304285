use crate::csv::rows_to_csv;
use crate::error::PermError;
use crate::extract::{tag_blocks, tag_value};
use crate::registry::PermissionType;

/// Extraction output for one permission type.
#[derive(Debug)]
pub struct ExtractSection {
    pub permission_type: PermissionType,
    pub count: usize,
    pub csv: String,
}

/// The XML-to-CSV pipeline's result: one CSV per type that yielded
/// rows, plus a combined CSV carrying a leading `PermissionType` column
/// when more than one type was found.
#[derive(Debug)]
pub struct ExtractReport {
    pub sections: Vec<ExtractSection>,
    pub combined_csv: Option<String>,
    pub total: usize,
}

/// Project permission blocks onto their registry schema and serialize
/// as CSV, one section per requested type in the order given.
pub fn extract_to_csv(xml: &str, types: &[PermissionType]) -> Result<ExtractReport, PermError> {
    if xml.trim().is_empty() {
        return Err(PermError::EmptyInput);
    }

    let mut sections = Vec::new();
    let mut combined: Vec<Vec<(String, String)>> = Vec::new();

    for &permission_type in types {
        let spec = permission_type.spec();
        let mut rows: Vec<Vec<(String, String)>> = Vec::new();
        for block in tag_blocks(xml, spec.tag) {
            let row: Vec<(String, String)> = spec
                .schema
                .iter()
                .map(|field| {
                    let value = tag_value(block.inner, field.tag)
                        .filter(|value| !value.is_empty())
                        .unwrap_or_else(|| field.fallback.unwrap_or_default());
                    (field.column.to_string(), value.to_string())
                })
                .collect();
            rows.push(row);
        }
        if rows.is_empty() {
            continue;
        }
        for row in &rows {
            let mut combined_row = vec![("PermissionType".to_string(), spec.tag.to_string())];
            combined_row.extend(row.iter().cloned());
            combined.push(combined_row);
        }
        sections.push(ExtractSection {
            permission_type,
            count: rows.len(),
            csv: rows_to_csv(&rows),
        });
    }

    let total = sections.iter().map(|section| section.count).sum();
    let combined_csv = (sections.len() > 1).then(|| rows_to_csv(&combined));
    Ok(ExtractReport {
        sections,
        combined_csv,
        total,
    })
}
