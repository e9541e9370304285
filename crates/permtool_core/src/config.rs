use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::dedup::RootElement;
use crate::registry::{ALL_TYPES, PermissionType};

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PermtoolConfig {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub extract: ExtractSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct OutputSection {
    /// Root element for merged dedupe output: `profile` or
    /// `permissionset`.
    pub dedupe_root: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ExtractSection {
    /// Permission type tags extracted by default; empty means all.
    #[serde(default)]
    pub types: Vec<String>,
}

impl PermtoolConfig {
    /// Resolve the dedupe root element: env PERMTOOL_DEDUPE_ROOT >
    /// config > Profile.
    pub fn dedupe_root(&self) -> Result<RootElement> {
        let configured = env::var("PERMTOOL_DEDUPE_ROOT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| self.output.dedupe_root.clone());
        match configured {
            Some(name) => match RootElement::from_name(&name) {
                Some(root) => Ok(root),
                None => bail!("invalid dedupe root element: {name} (expected profile or permissionset)"),
            },
            None => Ok(RootElement::Profile),
        }
    }

    /// Resolve the default extract type selection: env
    /// PERMTOOL_EXTRACT_TYPES (comma list) > config > all types.
    pub fn extract_types(&self) -> Result<Vec<PermissionType>> {
        let names: Vec<String> = match env::var("PERMTOOL_EXTRACT_TYPES") {
            Ok(value) if !value.trim().is_empty() => value
                .split(',')
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            _ => self.extract.types.clone(),
        };
        if names.is_empty() {
            return Ok(ALL_TYPES.to_vec());
        }
        names
            .iter()
            .map(|name| PermissionType::from_tag(name).map_err(Into::into))
            .collect()
    }
}

/// Load a PermtoolConfig from a TOML file. Returns default if the file
/// doesn't exist.
pub fn load_config(config_path: &Path) -> Result<PermtoolConfig> {
    if !config_path.exists() {
        return Ok(PermtoolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: PermtoolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_resolves_profile_and_all_types() {
        let config = PermtoolConfig::default();
        assert_eq!(config.dedupe_root().expect("root"), RootElement::Profile);
        assert_eq!(config.extract_types().expect("types").len(), 13);
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/permtool.toml")).expect("load config");
        assert_eq!(config, PermtoolConfig::default());
    }

    #[test]
    fn load_config_parses_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("permtool.toml");
        fs::write(
            &config_path,
            r#"
[output]
dedupe_root = "permissionset"

[extract]
types = ["userPermissions", "objectPermissions"]
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(
            config.dedupe_root().expect("root"),
            RootElement::PermissionSet
        );
        assert_eq!(
            config.extract_types().expect("types"),
            vec![
                PermissionType::UserPermissions,
                PermissionType::ObjectPermissions
            ]
        );
    }

    #[test]
    fn load_config_tolerates_partial_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("permtool.toml");
        fs::write(&config_path, "[output]\n").expect("write config");
        let config = load_config(&config_path).expect("load config");
        assert!(config.output.dedupe_root.is_none());
        assert!(config.extract.types.is_empty());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("permtool.toml");
        fs::write(&config_path, "[output\ndedupe_root = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn invalid_dedupe_root_is_an_error() {
        let config = PermtoolConfig {
            output: OutputSection {
                dedupe_root: Some("package".to_string()),
            },
            ..PermtoolConfig::default()
        };
        let error = config.dedupe_root().expect_err("must fail");
        assert!(error.to_string().contains("invalid dedupe root"));
    }

    #[test]
    fn unknown_extract_type_is_an_error() {
        let config = PermtoolConfig {
            extract: ExtractSection {
                types: vec!["loginHours".to_string()],
            },
            ..PermtoolConfig::default()
        };
        let error = config.extract_types().expect_err("must fail");
        assert!(error.to_string().contains("loginHours"));
    }
}
