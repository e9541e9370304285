use crate::error::PermError;
use crate::registry::{ALL_TYPES, FieldKind, FieldValue};
use crate::session::PermissionSession;

pub const METADATA_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Document-level inputs for a permission-set build.
#[derive(Debug, Clone, Default)]
pub struct PermissionSetMetadata {
    /// Human label, required.
    pub name: String,
    /// Optional description; defaults to `Permission Set: {name}`.
    pub description: Option<String>,
    pub activation_required: bool,
    /// `Some` requests custom API-name mode; `None` derives the API name
    /// from the label.
    pub api_name: Option<String>,
}

/// API name derived from a label: everything outside `[A-Za-z0-9 ]` is
/// stripped, then whitespace runs become single underscores.
pub fn derive_api_name(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == ' ')
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Assemble the complete permission-set document from the session's
/// records: declaration, metadata header, then one block per permission
/// type in registry order with sub-elements in declared schema order.
pub fn build(
    session: &PermissionSession,
    metadata: &PermissionSetMetadata,
) -> Result<String, PermError> {
    let label = metadata.name.trim();
    if label.is_empty() {
        return Err(PermError::MissingName);
    }

    let api_name = match &metadata.api_name {
        Some(custom) => {
            let trimmed = custom.trim();
            if trimmed.is_empty() {
                return Err(PermError::MissingApiName);
            }
            trimmed.to_string()
        }
        None => derive_api_name(label),
    };

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<PermissionSet xmlns=\"{METADATA_NAMESPACE}\">\n"));

    if !api_name.is_empty() {
        xml.push_str(&format!("  <fullName>{}</fullName>\n", escape_xml(&api_name)));
    }
    match metadata.description.as_deref().map(str::trim) {
        Some(description) if !description.is_empty() => {
            xml.push_str(&format!(
                "  <description>{}</description>\n",
                escape_xml(description)
            ));
        }
        _ => {
            xml.push_str(&format!(
                "  <description>Permission Set: {}</description>\n",
                escape_xml(label)
            ));
        }
    }
    xml.push_str(&format!(
        "  <hasActivationRequired>{}</hasActivationRequired>\n",
        metadata.activation_required
    ));
    xml.push_str(&format!("  <label>{}</label>\n", escape_xml(label)));
    xml.push_str("  <license>Salesforce</license>\n");

    for permission_type in ALL_TYPES {
        let spec = permission_type.spec();
        for record in session.records(permission_type) {
            xml.push_str(&format!("  <{}>\n", spec.tag));
            for field in spec.schema {
                match field.kind {
                    FieldKind::Flag => {
                        let value = record.value(field.tag).is_some_and(FieldValue::as_flag);
                        if field.omit_false && !value {
                            continue;
                        }
                        xml.push_str(&format!("    <{0}>{value}</{0}>\n", field.tag));
                    }
                    FieldKind::Text | FieldKind::TabVisibility => {
                        let value = record
                            .value(field.tag)
                            .map(FieldValue::render)
                            .unwrap_or_default();
                        xml.push_str(&format!(
                            "    <{0}>{1}</{0}>\n",
                            field.tag,
                            escape_xml(&value)
                        ));
                    }
                }
            }
            xml.push_str(&format!("  </{}>\n", spec.tag));
        }
    }

    xml.push_str("</PermissionSet>");
    Ok(xml)
}

/// Entity-escape the five XML special characters in text content.
pub fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::{PermissionSetMetadata, build, derive_api_name, escape_xml};
    use crate::error::PermError;
    use crate::registry::{FieldValue, PermissionRecord, PermissionType};
    use crate::session::PermissionSession;

    fn metadata(name: &str) -> PermissionSetMetadata {
        PermissionSetMetadata {
            name: name.to_string(),
            ..PermissionSetMetadata::default()
        }
    }

    #[test]
    fn derive_api_name_strips_and_underscores() {
        assert_eq!(derive_api_name("My Perms"), "My_Perms");
        assert_eq!(derive_api_name("Sales & Ops (EMEA)"), "Sales_Ops_EMEA");
        assert_eq!(derive_api_name("  spaced   out  "), "spaced_out");
    }

    #[test]
    fn empty_name_is_rejected() {
        let session = PermissionSession::new();
        let error = build(&session, &metadata("  ")).expect_err("must fail");
        assert_eq!(error, PermError::MissingName);
    }

    #[test]
    fn custom_api_mode_requires_a_value() {
        let session = PermissionSession::new();
        let mut meta = metadata("My Perms");
        meta.api_name = Some("  ".to_string());
        let error = build(&session, &meta).expect_err("must fail");
        assert_eq!(error, PermError::MissingApiName);
    }

    #[test]
    fn derived_api_name_lands_in_full_name() {
        let session = PermissionSession::new();
        let xml = build(&session, &metadata("My Perms")).expect("build");
        assert!(xml.contains("<fullName>My_Perms</fullName>"));
        assert!(xml.contains("<label>My Perms</label>"));
        assert!(xml.contains("<description>Permission Set: My Perms</description>"));
        assert!(xml.contains("<hasActivationRequired>false</hasActivationRequired>"));
        assert!(xml.contains("<license>Salesforce</license>"));
        assert!(xml.ends_with("</PermissionSet>"));
    }

    #[test]
    fn user_values_are_escaped() {
        let mut session = PermissionSession::new();
        let mut record = PermissionRecord::new(PermissionType::ClassAccesses);
        record.set("apexClass", FieldValue::Text("A&B<C".to_string()));
        record.set("enabled", FieldValue::Flag(true));
        session.add(vec![record]);

        let xml = build(&session, &metadata("Escapes")).expect("build");
        assert!(xml.contains("<apexClass>A&amp;B&lt;C</apexClass>"));
    }

    #[test]
    fn types_emit_in_registry_order_with_schema_order() {
        let mut session = PermissionSession::new();
        let mut user = PermissionRecord::new(PermissionType::UserPermissions);
        user.set("name", FieldValue::Text("ViewAllData".to_string()));
        user.set("enabled", FieldValue::Flag(true));
        let mut class = PermissionRecord::new(PermissionType::ClassAccesses);
        class.set("apexClass", FieldValue::Text("MyClass".to_string()));
        class.set("enabled", FieldValue::Flag(false));
        session.add(vec![user, class]);

        let xml = build(&session, &metadata("Ordered")).expect("build");
        let class_pos = xml.find("<classAccesses>").expect("class block");
        let user_pos = xml.find("<userPermissions>").expect("user block");
        assert!(class_pos < user_pos);
        assert!(xml.contains(
            "  <userPermissions>\n    <enabled>true</enabled>\n    <name>ViewAllData</name>\n  </userPermissions>\n"
        ));
    }

    #[test]
    fn record_type_default_is_omitted_when_false() {
        let mut session = PermissionSession::new();
        let mut visible = PermissionRecord::new(PermissionType::RecordTypeVisibilities);
        visible.set("recordType", FieldValue::Text("Account.Business".to_string()));
        visible.set("visible", FieldValue::Flag(true));
        visible.set("default", FieldValue::Flag(false));
        let mut defaulted = PermissionRecord::new(PermissionType::RecordTypeVisibilities);
        defaulted.set("recordType", FieldValue::Text("Account.Person".to_string()));
        defaulted.set("visible", FieldValue::Flag(true));
        defaulted.set("default", FieldValue::Flag(true));
        session.add(vec![visible, defaulted]);

        let xml = build(&session, &metadata("Defaults")).expect("build");
        assert!(xml.contains(
            "  <recordTypeVisibilities>\n    <recordType>Account.Business</recordType>\n    <visible>true</visible>\n  </recordTypeVisibilities>\n"
        ));
        assert!(xml.contains(
            "  <recordTypeVisibilities>\n    <recordType>Account.Person</recordType>\n    <visible>true</visible>\n    <default>true</default>\n  </recordTypeVisibilities>\n"
        ));
    }

    #[test]
    fn escape_covers_all_five_characters() {
        assert_eq!(
            escape_xml(r#"<a & "b" 'c'>"#),
            "&lt;a &amp; &quot;b&quot; &apos;c&apos;&gt;"
        );
    }
}
