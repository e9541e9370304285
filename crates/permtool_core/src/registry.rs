use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::PermError;

/// Salesforce metadata permission categories this tool understands.
///
/// Declaration order is the registry order: output documents emit type
/// blocks in this order regardless of input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionType {
    ApplicationVisibilities,
    ClassAccesses,
    CustomMetadataTypeAccesses,
    CustomSettingAccesses,
    ExternalDataSourceAccesses,
    FieldPermissions,
    FlowAccesses,
    LayoutAssignments,
    ObjectPermissions,
    PageAccesses,
    RecordTypeVisibilities,
    TabVisibilities,
    UserPermissions,
}

pub const ALL_TYPES: [PermissionType; 13] = [
    PermissionType::ApplicationVisibilities,
    PermissionType::ClassAccesses,
    PermissionType::CustomMetadataTypeAccesses,
    PermissionType::CustomSettingAccesses,
    PermissionType::ExternalDataSourceAccesses,
    PermissionType::FieldPermissions,
    PermissionType::FlowAccesses,
    PermissionType::LayoutAssignments,
    PermissionType::ObjectPermissions,
    PermissionType::PageAccesses,
    PermissionType::RecordTypeVisibilities,
    PermissionType::TabVisibilities,
    PermissionType::UserPermissions,
];

/// How a sub-element value is interpreted on both the CSV and XML sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Flag,
    TabVisibility,
}

pub const TAB_VISIBILITY_VALUES: [&str; 4] = ["DefaultOn", "DefaultOff", "Available", "Hidden"];

/// One output sub-element: XML tag, source CSV column, value kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub tag: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
    /// When true, a false flag drops the element entirely instead of
    /// emitting `false`.
    pub omit_false: bool,
    /// Substitute for an absent or empty text value during decode.
    pub fallback: Option<&'static str>,
}

const fn field(tag: &'static str, column: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        tag,
        column,
        kind,
        omit_false: false,
        fallback: None,
    }
}

const fn field_with_fallback(
    tag: &'static str,
    column: &'static str,
    fallback: &'static str,
) -> FieldSpec {
    FieldSpec {
        tag,
        column,
        kind: FieldKind::Text,
        omit_false: false,
        fallback: Some(fallback),
    }
}

const fn optional_flag(tag: &'static str, column: &'static str) -> FieldSpec {
    FieldSpec {
        tag,
        column,
        kind: FieldKind::Flag,
        omit_false: true,
        fallback: None,
    }
}

/// Per-type extraction and serialization rules.
#[derive(Debug, Clone, Copy)]
pub struct TypeSpec {
    pub tag: &'static str,
    /// Sub-elements whose values form the dedup identity key, joined with
    /// `|` when more than one is present.
    pub identity: &'static [&'static str],
    /// Output sub-elements in emission order.
    pub schema: &'static [FieldSpec],
    pub required_columns: &'static [&'static str],
}

impl PermissionType {
    pub fn tag(self) -> &'static str {
        self.spec().tag
    }

    pub fn spec(self) -> &'static TypeSpec {
        match self {
            PermissionType::ApplicationVisibilities => &APPLICATION_VISIBILITIES,
            PermissionType::ClassAccesses => &CLASS_ACCESSES,
            PermissionType::CustomMetadataTypeAccesses => &CUSTOM_METADATA_TYPE_ACCESSES,
            PermissionType::CustomSettingAccesses => &CUSTOM_SETTING_ACCESSES,
            PermissionType::ExternalDataSourceAccesses => &EXTERNAL_DATA_SOURCE_ACCESSES,
            PermissionType::FieldPermissions => &FIELD_PERMISSIONS,
            PermissionType::FlowAccesses => &FLOW_ACCESSES,
            PermissionType::LayoutAssignments => &LAYOUT_ASSIGNMENTS,
            PermissionType::ObjectPermissions => &OBJECT_PERMISSIONS,
            PermissionType::PageAccesses => &PAGE_ACCESSES,
            PermissionType::RecordTypeVisibilities => &RECORD_TYPE_VISIBILITIES,
            PermissionType::TabVisibilities => &TAB_VISIBILITIES,
            PermissionType::UserPermissions => &USER_PERMISSIONS,
        }
    }

    /// CSV column that must carry a value for a decoded row to survive.
    pub fn identity_column(self) -> &'static str {
        let spec = self.spec();
        let identity_tag = spec.identity[0];
        spec.schema
            .iter()
            .find(|field| field.tag == identity_tag)
            .map(|field| field.column)
            .unwrap_or(identity_tag)
    }

    /// Resolve a type from its XML tag name. Unregistered tags are an
    /// error; there is no generic fallback for unknown types.
    pub fn from_tag(tag: &str) -> Result<PermissionType, PermError> {
        ALL_TYPES
            .into_iter()
            .find(|candidate| candidate.tag() == tag)
            .ok_or_else(|| PermError::UnknownPermissionType(tag.to_string()))
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

static APPLICATION_VISIBILITIES: TypeSpec = TypeSpec {
    tag: "applicationVisibilities",
    identity: &["application"],
    schema: &[
        field("application", "Application", FieldKind::Text),
        field("default", "Default", FieldKind::Flag),
        field("visible", "Visible", FieldKind::Flag),
    ],
    required_columns: &["Application", "Visible", "Default"],
};

static CLASS_ACCESSES: TypeSpec = TypeSpec {
    tag: "classAccesses",
    identity: &["apexClass"],
    schema: &[
        field("apexClass", "ApexClass", FieldKind::Text),
        field("enabled", "Enabled", FieldKind::Flag),
    ],
    required_columns: &["ApexClass", "Enabled"],
};

static CUSTOM_METADATA_TYPE_ACCESSES: TypeSpec = TypeSpec {
    tag: "customMetadataTypeAccesses",
    identity: &["name"],
    schema: &[
        field("enabled", "Enabled", FieldKind::Flag),
        field("name", "Name", FieldKind::Text),
    ],
    required_columns: &["Name", "Enabled"],
};

static CUSTOM_SETTING_ACCESSES: TypeSpec = TypeSpec {
    tag: "customSettingAccesses",
    identity: &["name"],
    schema: &[
        field("enabled", "Enabled", FieldKind::Flag),
        field("name", "Name", FieldKind::Text),
    ],
    required_columns: &["Name", "Enabled"],
};

static EXTERNAL_DATA_SOURCE_ACCESSES: TypeSpec = TypeSpec {
    tag: "externalDataSourceAccesses",
    identity: &["externalDataSource"],
    schema: &[
        field("enabled", "Enabled", FieldKind::Flag),
        field("externalDataSource", "Name", FieldKind::Text),
    ],
    required_columns: &["Name", "Enabled"],
};

static FIELD_PERMISSIONS: TypeSpec = TypeSpec {
    tag: "fieldPermissions",
    identity: &["field"],
    schema: &[
        field("editable", "Editable", FieldKind::Flag),
        field("field", "Field", FieldKind::Text),
        field("readable", "Readable", FieldKind::Flag),
    ],
    required_columns: &["Field", "Readable", "Editable"],
};

static FLOW_ACCESSES: TypeSpec = TypeSpec {
    tag: "flowAccesses",
    identity: &["flow"],
    schema: &[
        field("enabled", "Enabled", FieldKind::Flag),
        field("flow", "Name", FieldKind::Text),
    ],
    required_columns: &["Name", "Enabled"],
};

static LAYOUT_ASSIGNMENTS: TypeSpec = TypeSpec {
    tag: "layoutAssignments",
    identity: &["layout", "recordType"],
    schema: &[
        field("layout", "Layout", FieldKind::Text),
        field_with_fallback("recordType", "RecordType", "Master"),
    ],
    required_columns: &["Layout"],
};

static OBJECT_PERMISSIONS: TypeSpec = TypeSpec {
    tag: "objectPermissions",
    identity: &["object"],
    schema: &[
        field("allowCreate", "AllowCreate", FieldKind::Flag),
        field("allowDelete", "AllowDelete", FieldKind::Flag),
        field("allowEdit", "AllowEdit", FieldKind::Flag),
        field("allowRead", "AllowRead", FieldKind::Flag),
        field("modifyAllRecords", "ModifyAllRecords", FieldKind::Flag),
        field("object", "Object", FieldKind::Text),
        field("viewAllRecords", "ViewAllRecords", FieldKind::Flag),
    ],
    required_columns: &[
        "Object",
        "AllowCreate",
        "AllowRead",
        "AllowEdit",
        "AllowDelete",
        "ViewAllRecords",
        "ModifyAllRecords",
    ],
};

static PAGE_ACCESSES: TypeSpec = TypeSpec {
    tag: "pageAccesses",
    identity: &["apexPage"],
    schema: &[
        field("apexPage", "ApexPage", FieldKind::Text),
        field("enabled", "Enabled", FieldKind::Flag),
    ],
    required_columns: &["ApexPage", "Enabled"],
};

static RECORD_TYPE_VISIBILITIES: TypeSpec = TypeSpec {
    tag: "recordTypeVisibilities",
    identity: &["recordType"],
    schema: &[
        field("recordType", "RecordType", FieldKind::Text),
        field("visible", "Visible", FieldKind::Flag),
        optional_flag("default", "Default"),
    ],
    required_columns: &["RecordType", "Visible", "Default"],
};

static TAB_VISIBILITIES: TypeSpec = TypeSpec {
    tag: "tabVisibilities",
    identity: &["tab"],
    schema: &[
        field("tab", "Tab", FieldKind::Text),
        field("visibility", "Visibility", FieldKind::TabVisibility),
    ],
    required_columns: &["Tab", "Visibility"],
};

static USER_PERMISSIONS: TypeSpec = TypeSpec {
    tag: "userPermissions",
    identity: &["name"],
    schema: &[
        field("enabled", "Enabled", FieldKind::Flag),
        field("name", "PermissionName", FieldKind::Text),
    ],
    required_columns: &["PermissionName", "Enabled"],
};

/// A decoded sub-element value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
}

impl FieldValue {
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(value) => value.clone(),
            FieldValue::Flag(value) => value.to_string(),
        }
    }

    pub fn as_flag(&self) -> bool {
        matches!(self, FieldValue::Flag(true))
    }
}

/// A typed permission entry: sub-tag name to value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionRecord {
    permission_type: PermissionType,
    values: BTreeMap<&'static str, FieldValue>,
}

impl PermissionRecord {
    pub fn new(permission_type: PermissionType) -> Self {
        Self {
            permission_type,
            values: BTreeMap::new(),
        }
    }

    pub fn permission_type(&self) -> PermissionType {
        self.permission_type
    }

    pub fn set(&mut self, tag: &'static str, value: FieldValue) {
        self.values.insert(tag, value);
    }

    pub fn value(&self, tag: &str) -> Option<&FieldValue> {
        self.values.get(tag)
    }

    /// Identity key for duplicate detection: identity sub-values joined
    /// with `|`. Missing sub-values are skipped; a record with no identity
    /// values at all keys on the concatenation of everything it has.
    pub fn identity_key(&self) -> String {
        let spec = self.permission_type.spec();
        let parts: Vec<String> = spec
            .identity
            .iter()
            .filter_map(|tag| self.values.get(*tag).map(FieldValue::render))
            .collect();
        if parts.is_empty() || parts.iter().all(String::is_empty) {
            self.values
                .values()
                .map(FieldValue::render)
                .collect::<Vec<_>>()
                .join("|")
        } else {
            parts.join("|")
        }
    }

    /// Schema-ordered `(column, value)` pairs for CSV encoding. Flags
    /// normalize to the literal strings `true`/`false`.
    pub fn csv_row(&self) -> Vec<(String, String)> {
        self.permission_type
            .spec()
            .schema
            .iter()
            .map(|field| {
                let value = self
                    .values
                    .get(field.tag)
                    .map(FieldValue::render)
                    .unwrap_or_default();
                (field.column.to_string(), value)
            })
            .collect()
    }

    /// Short human label for listings, taken from the identity column.
    pub fn display_name(&self) -> String {
        let spec = self.permission_type.spec();
        self.values
            .get(spec.identity[0])
            .map(FieldValue::render)
            .unwrap_or_default()
    }
}
