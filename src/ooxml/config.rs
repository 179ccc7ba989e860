//! Configuration passed into open and save.
//!
//! Nothing here is process-global: the application name stamped into `docProps/app.xml`,
//! the compression, the staging root, the save policy and the tracing subscriber all travel
//! with the [`PackageConfig`] a root object was opened or created with.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ooxml::error::{OoxmlError, Result};

/// ZIP compression for written members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

/// Serializable settings.
///
/// ```
/// use kumquat::ooxml::config::{Compression, PackageSettings};
/// let settings = PackageSettings::from_yaml("application: Report Builder\ncompression: stored\n").unwrap();
/// assert_eq!(settings.application, "Report Builder");
/// assert_eq!(settings.compression, Compression::Stored);
/// assert!(!settings.validate_on_save);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageSettings {
    /// Written to `Application` in `docProps/app.xml` of new packages.
    pub application: String,
    /// Written to `AppVersion`, formatted `XX.YYYY`.
    pub app_version: String,
    pub compression: Compression,
    /// Parent directory for staging directories; the system temp dir when unset.
    pub staging_dir: Option<PathBuf>,
    /// Run the structural checks on save and log what they find.
    pub validate_on_save: bool,
}

impl Default for PackageSettings {
    fn default() -> Self {
        Self {
            application: "kumquat".to_string(),
            app_version: format!(
                "{:0>2}.{:0>4}",
                env!("CARGO_PKG_VERSION_MAJOR"),
                env!("CARGO_PKG_VERSION_MINOR")
            ),
            compression: Compression::default(),
            staging_dir: None,
            validate_on_save: false,
        }
    }
}

impl PackageSettings {
    /// Load settings from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml)
            .map_err(|e| OoxmlError::Config(format!("invalid package settings: {}", e)))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_saphyr::to_string(self)
            .map_err(|e| OoxmlError::Config(format!("cannot serialize package settings: {}", e)))
    }
}

/// What a save should do beyond writing the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allow,
    /// Write the document with a visible watermark header carrying this text.
    Watermark(String),
}

/// Hook consulted once per save.
pub trait SavePolicy: Send + Sync + fmt::Debug {
    fn evaluate(&self) -> PolicyVerdict;
}

/// Default policy: every save is allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl SavePolicy for AllowAll {
    fn evaluate(&self) -> PolicyVerdict {
        PolicyVerdict::Allow
    }
}

/// Settings plus the runtime hooks.
#[derive(Clone)]
pub struct PackageConfig {
    pub settings: PackageSettings,
    pub policy: Arc<dyn SavePolicy>,
    dispatch: Option<tracing::Dispatch>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            settings: PackageSettings::default(),
            policy: Arc::new(AllowAll),
            dispatch: None,
        }
    }
}

impl fmt::Debug for PackageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageConfig")
            .field("settings", &self.settings)
            .field("policy", &self.policy)
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}

impl PackageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: PackageSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_policy<P: SavePolicy + 'static>(mut self, policy: P) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    /// Route all logging of operations using this config to `dispatch` instead of the
    /// ambient subscriber.
    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Run `f` with this config's subscriber installed, if it has one.
    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}
