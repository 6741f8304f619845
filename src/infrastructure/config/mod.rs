//! 配置管理基础设施层
//!
//! 分层加载：默认值 → 配置文件 (TOML/JSON) → 环境变量 `MODEL_ARCHIVE_*`。
//! Nested keys use `__` in environment variables, e.g.
//! `MODEL_ARCHIVE_HELPER__JAVA_HOME`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

use crate::archive::BackendKind;
use crate::error::{ArchiveError, Result};

pub const ENV_PREFIX: &str = "MODEL_ARCHIVE";

/// 引擎配置根结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendKind,

    /// Parent directory for temporary work files.
    pub temp_dir: Option<PathBuf>,

    /// Deflate level for newly added entries; library default when unset.
    #[validate(range(min = 0, max = 9))]
    pub compression_level: Option<i64>,

    #[validate(length(min = 1, max = 200))]
    pub log_level: String,

    #[validate(nested)]
    pub helper: Option<HelperConfig>,
}

/// 外部归档助手配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HelperConfig {
    /// Shell script or executable that runs the helper.
    #[validate(custom(function = "validate_non_empty_path"))]
    pub executable: PathBuf,

    /// Exported as `JAVA_HOME` for the helper process.
    #[validate(custom(function = "validate_non_empty_path"))]
    pub java_home: PathBuf,

    /// Arguments placed before the verb.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: Vec<String>,

    /// Exit codes treated as success; `1` means warnings were reported.
    #[serde(default = "default_success_exit_codes")]
    #[validate(length(min = 1))]
    pub success_exit_codes: Vec<i32>,
}

fn default_command_prefix() -> Vec<String> {
    vec!["wktui".to_string()]
}

fn default_success_exit_codes() -> Vec<i32> {
    vec![0, 1]
}

fn validate_non_empty_path(path: &PathBuf) -> std::result::Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::InMemory,
            temp_dir: None,
            compression_level: None,
            log_level: "info".to_string(),
            helper: None,
        }
    }
}

impl HelperConfig {
    pub fn new(executable: impl Into<PathBuf>, java_home: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            java_home: java_home.into(),
            command_prefix: default_command_prefix(),
            success_exit_codes: default_success_exit_codes(),
        }
    }
}

impl EngineConfig {
    /// Load configuration, later sources overriding earlier ones.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = config::Config::try_from(&EngineConfig::default())
            .map_err(|e| ArchiveError::config(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let loaded: EngineConfig = builder
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ArchiveError::config(e.to_string()))?;

        loaded.ensure_valid()?;
        Ok(loaded)
    }

    /// Field validators plus cross-field rules.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate().map_err(|e| ArchiveError::config(e.to_string()))?;

        if self.backend == BackendKind::Helper && self.helper.is_none() {
            return Err(ArchiveError::config(
                "the helper backend requires a [helper] section",
            ));
        }
        Ok(())
    }

    pub fn helper_config(&self) -> Result<&HelperConfig> {
        self.helper
            .as_ref()
            .ok_or_else(|| ArchiveError::config("helper backend is not configured"))
    }
}
