use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::builder::METADATA_NAMESPACE;
use crate::error::PermError;
use crate::extract::{tag_blocks, tag_value};
use crate::registry::{PermissionType, TypeSpec};

/// Root element of a merged output document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootElement {
    Profile,
    PermissionSet,
}

impl RootElement {
    pub fn tag(self) -> &'static str {
        match self {
            RootElement::Profile => "Profile",
            RootElement::PermissionSet => "PermissionSet",
        }
    }

    pub fn from_name(name: &str) -> Option<RootElement> {
        match name.trim().to_ascii_lowercase().as_str() {
            "profile" => Some(RootElement::Profile),
            "permissionset" | "permission-set" | "permission_set" => {
                Some(RootElement::PermissionSet)
            }
            _ => None,
        }
    }
}

impl fmt::Display for RootElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub total: usize,
    pub unique: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DedupStats {
    pub total_processed: usize,
    pub total_unique: usize,
    pub total_duplicates: usize,
    /// Per-tag counts, only for types that actually occurred.
    pub by_type: BTreeMap<String, TypeCounts>,
}

/// Surviving raw blocks per type plus the run's statistics.
#[derive(Debug)]
pub struct DedupOutcome {
    blocks: BTreeMap<PermissionType, Vec<String>>,
    pub stats: DedupStats,
}

impl DedupOutcome {
    pub fn blocks(&self, permission_type: PermissionType) -> &[String] {
        self.blocks
            .get(&permission_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Merged document: declaration, root element in the metadata
    /// namespace, surviving blocks indented four spaces, types in
    /// registry order and blocks in survival order.
    pub fn render(&self, root: RootElement) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<{} xmlns=\"{METADATA_NAMESPACE}\">\n", root.tag()));
        for blocks in self.blocks.values() {
            for block in blocks {
                xml.push_str("    ");
                xml.push_str(block);
                xml.push('\n');
            }
        }
        xml.push_str(&format!("</{}>", root.tag()));
        xml
    }
}

/// Merge permission blocks from ordered documents, keeping the first
/// occurrence of each identity key per type. Document order is
/// significant: later files can never override earlier ones.
pub fn deduplicate(
    documents: &[String],
    types: &[PermissionType],
) -> Result<DedupOutcome, PermError> {
    if documents.is_empty() {
        return Err(PermError::EmptyInput);
    }

    let mut blocks: BTreeMap<PermissionType, Vec<String>> = BTreeMap::new();
    let mut seen: BTreeMap<PermissionType, HashSet<String>> = BTreeMap::new();
    let mut stats = DedupStats::default();

    for document in documents {
        for &permission_type in types {
            let spec = permission_type.spec();
            for block in tag_blocks(document, spec.tag) {
                let key = block_identity(spec, block.inner);
                let inserted = seen.entry(permission_type).or_default().insert(key);
                if inserted {
                    blocks
                        .entry(permission_type)
                        .or_default()
                        .push(block.raw.to_string());
                    stats.total_unique += 1;
                } else {
                    stats.total_duplicates += 1;
                }
                stats.total_processed += 1;
                let counts = stats.by_type.entry(spec.tag.to_string()).or_default();
                counts.total += 1;
                if inserted {
                    counts.unique += 1;
                } else {
                    counts.duplicates += 1;
                }
            }
        }
    }

    Ok(DedupOutcome { blocks, stats })
}

/// Identity key of one raw block: identity sub-values joined with `|`.
/// When the designated sub-elements are absent (or empty), the whole
/// trimmed inner text identifies the block by content.
fn block_identity(spec: &TypeSpec, inner: &str) -> String {
    let parts: Vec<&str> = spec
        .identity
        .iter()
        .filter_map(|tag| tag_value(inner, tag))
        .collect();
    if parts.is_empty() || parts.iter().all(|part| part.is_empty()) {
        inner.trim().to_string()
    } else {
        parts.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::{RootElement, deduplicate};
    use crate::error::PermError;
    use crate::registry::PermissionType;

    fn user_permission(name: &str, enabled: &str) -> String {
        format!("<userPermissions><name>{name}</name><enabled>{enabled}</enabled></userPermissions>")
    }

    #[test]
    fn identical_block_across_documents_is_one_record_one_duplicate() {
        let block = user_permission("ViewAllData", "true");
        let doc1 = format!("<Profile>{block}</Profile>");
        let doc2 = format!("<Profile>{block}</Profile>");
        let outcome = deduplicate(&[doc1, doc2], &[PermissionType::UserPermissions])
            .expect("deduplicate");
        assert_eq!(outcome.blocks(PermissionType::UserPermissions).len(), 1);
        assert_eq!(outcome.stats.total_duplicates, 1);
    }

    #[test]
    fn first_document_wins_on_conflicting_content() {
        let doc1 = format!("<Profile>{}</Profile>", user_permission("ViewAllData", "true"));
        let doc2 = format!("<Profile>{}</Profile>", user_permission("ViewAllData", "false"));
        let outcome = deduplicate(&[doc1, doc2], &[PermissionType::UserPermissions])
            .expect("deduplicate");
        let survivors = outcome.blocks(PermissionType::UserPermissions);
        assert_eq!(survivors.len(), 1);
        assert!(survivors[0].contains("<enabled>true</enabled>"));
    }

    #[test]
    fn counts_match_the_three_block_scenario() {
        let doc1 = format!(
            "<Profile>{}{}</Profile>",
            user_permission("ViewAllData", "true"),
            user_permission("ModifyAllData", "true"),
        );
        let doc2 = format!("<Profile>{}</Profile>", user_permission("ViewAllData", "true"));
        let outcome = deduplicate(&[doc1, doc2], &[PermissionType::UserPermissions])
            .expect("deduplicate");
        assert_eq!(outcome.stats.total_processed, 3);
        assert_eq!(outcome.stats.total_unique, 2);
        assert_eq!(outcome.stats.total_duplicates, 1);
        let counts = outcome.stats.by_type.get("userPermissions").expect("counts");
        assert_eq!(counts.total, 3);
        assert_eq!(counts.unique, 2);
        assert_eq!(counts.duplicates, 1);
    }

    #[test]
    fn missing_identity_falls_back_to_content() {
        let doc = "<userPermissions><enabled>true</enabled></userPermissions>\
                   <userPermissions><enabled>true</enabled></userPermissions>\
                   <userPermissions><enabled>false</enabled></userPermissions>"
            .to_string();
        let outcome =
            deduplicate(&[doc], &[PermissionType::UserPermissions]).expect("deduplicate");
        assert_eq!(outcome.blocks(PermissionType::UserPermissions).len(), 2);
        assert_eq!(outcome.stats.total_duplicates, 1);
    }

    #[test]
    fn layout_assignments_key_on_layout_and_record_type() {
        let doc = "<layoutAssignments><layout>L</layout><recordType>A</recordType></layoutAssignments>\
                   <layoutAssignments><layout>L</layout><recordType>B</recordType></layoutAssignments>\
                   <layoutAssignments><layout>L</layout><recordType>A</recordType></layoutAssignments>"
            .to_string();
        let outcome =
            deduplicate(&[doc], &[PermissionType::LayoutAssignments]).expect("deduplicate");
        assert_eq!(outcome.blocks(PermissionType::LayoutAssignments).len(), 2);
    }

    #[test]
    fn empty_document_list_is_rejected() {
        let error = deduplicate(&[], &[PermissionType::UserPermissions]).expect_err("must fail");
        assert_eq!(error, PermError::EmptyInput);
    }

    #[test]
    fn render_emits_registry_order_independent_of_request_order() {
        let doc = format!(
            "<Profile>{}<classAccesses><apexClass>C</apexClass><enabled>true</enabled></classAccesses></Profile>",
            user_permission("ViewAllData", "true"),
        );
        let outcome = deduplicate(
            &[doc],
            &[PermissionType::UserPermissions, PermissionType::ClassAccesses],
        )
        .expect("deduplicate");
        let xml = outcome.render(RootElement::Profile);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Profile xmlns="));
        assert!(xml.ends_with("</Profile>"));
        let class_pos = xml.find("<classAccesses>").expect("class block");
        let user_pos = xml.find("<userPermissions>").expect("user block");
        assert!(class_pos < user_pos);
    }
}
