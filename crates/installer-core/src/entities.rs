//! Domain payloads carried by an install session.
//!
//! None of these are interpreted by the coordinator itself. The worker fills
//! them in and observers read them back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which privilege backend performs the install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Authorizer {
    /// Defer to the global setting.
    #[default]
    Global,
    None,
    Root,
    Shizuku,
    Dhizuku,
    /// Run `customize_authorizer` as the privileged command.
    Customize,
}

/// How the install is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallMode {
    #[default]
    Global,
    Dialog,
    AutoDialog,
    Notification,
    AutoNotification,
    Ignore,
}

/// Configuration snapshot for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallConfig {
    pub name: String,
    pub authorizer: Authorizer,
    pub customize_authorizer: String,
    pub install_mode: InstallMode,
    /// Package to report as the installer, if overridden.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installer: Option<String>,
    pub for_all_user: bool,
    pub allow_test_only: bool,
    pub allow_downgrade: bool,
    /// Delete the source files once installed.
    pub auto_delete: bool,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            authorizer: Authorizer::Global,
            customize_authorizer: String::new(),
            install_mode: InstallMode::Global,
            installer: None,
            for_all_user: false,
            allow_test_only: false,
            allow_downgrade: false,
            auto_delete: false,
        }
    }
}

/// Where a package to install comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DataSource {
    /// A file on the local filesystem.
    File { path: String },
    /// An entry inside an archive.
    ZipEntry { archive: String, name: String },
    /// An opaque content URI handed over by the host.
    Uri { uri: String },
}

impl DataSource {
    /// Short human-readable description of the source.
    pub fn display_name(&self) -> &str {
        match self {
            DataSource::File { path } => path.rsplit('/').next().unwrap_or(path),
            DataSource::ZipEntry { name, .. } => name,
            DataSource::Uri { uri } => uri,
        }
    }
}

/// A package the user can choose to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallCandidate {
    pub package_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    pub version_code: u64,
    pub source: DataSource,
    pub selected: bool,
}

/// Transient notifications posted by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InstallerEvent {
    /// Something worth showing to the user once.
    Notice { message: String },
    /// Ask whatever UI is showing the session to go away.
    RequestDismiss,
    /// Ask the host to bring the session back to the foreground.
    RequestForeground,
}

/// Failure recorded on a session by its worker.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "message", rename_all = "camelCase")]
pub enum InstallError {
    #[error("Failed to resolve install source: {0}")]
    Resolve(String),

    #[error("Failed to analyse package: {0}")]
    Analyse(String),

    #[error("Failed to install package: {0}")]
    Install(String),

    #[error("Session was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod install_config {
        use super::*;

        #[test]
        fn default_is_global() {
            let config = InstallConfig::default();
            assert_eq!(config.authorizer, Authorizer::Global);
            assert_eq!(config.install_mode, InstallMode::Global);
            assert!(config.installer.is_none());
            assert!(!config.allow_downgrade);
        }

        #[test]
        fn serializes_camel_case() {
            let config = InstallConfig {
                allow_test_only: true,
                install_mode: InstallMode::AutoDialog,
                ..Default::default()
            };
            let value = serde_json::to_value(&config).unwrap();
            assert_eq!(value["allowTestOnly"], true);
            assert_eq!(value["installMode"], "autoDialog");
            assert!(value.get("installer").is_none());
        }

        #[test]
        fn missing_fields_fall_back_to_default() {
            let config: InstallConfig =
                serde_json::from_value(json!({"authorizer": "root"})).unwrap();
            assert_eq!(config.authorizer, Authorizer::Root);
            assert_eq!(config.name, "default");
        }
    }

    mod data_source {
        use super::*;

        #[test]
        fn display_name_uses_file_name() {
            let source = DataSource::File {
                path: "/sdcard/Download/app.apk".to_string(),
            };
            assert_eq!(source.display_name(), "app.apk");
        }

        #[test]
        fn display_name_for_zip_entry() {
            let source = DataSource::ZipEntry {
                archive: "/tmp/bundle.apks".to_string(),
                name: "base.apk".to_string(),
            };
            assert_eq!(source.display_name(), "base.apk");
        }

        #[test]
        fn tagged_by_kind() {
            let source = DataSource::Uri {
                uri: "content://downloads/1".to_string(),
            };
            let value = serde_json::to_value(&source).unwrap();
            assert_eq!(value["kind"], "uri");
            assert_eq!(value["uri"], "content://downloads/1");
        }
    }

    mod installer_event {
        use super::*;

        #[test]
        fn unit_variants_serialize_with_kind() {
            let value = serde_json::to_value(InstallerEvent::RequestDismiss).unwrap();
            assert_eq!(value, json!({"kind": "requestDismiss"}));
        }

        #[test]
        fn parses_notice() {
            let event: InstallerEvent =
                serde_json::from_value(json!({"kind": "notice", "message": "hi"})).unwrap();
            assert_eq!(
                event,
                InstallerEvent::Notice {
                    message: "hi".to_string()
                }
            );
        }
    }

    mod install_error {
        use super::*;

        #[test]
        fn display_includes_message() {
            let error = InstallError::Install("INSTALL_FAILED_VERSION_DOWNGRADE".to_string());
            assert!(error
                .to_string()
                .contains("INSTALL_FAILED_VERSION_DOWNGRADE"));
        }

        #[test]
        fn serializes_stage_and_message() {
            let value = serde_json::to_value(InstallError::Analyse("bad manifest".into())).unwrap();
            assert_eq!(value, json!({"stage": "analyse", "message": "bad manifest"}));
        }
    }
}
