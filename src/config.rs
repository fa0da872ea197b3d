//! Project configuration: filename formats and default time units.

use crate::error::{NcTimeError, Result};
use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the configuration directory.
pub const CONFIG_FILENAME: &str = "nctime.toml";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "NCTIME_CONFIG_DIR";

const BUILTIN: &str = r#"
[project.cmip5]
filename_format = "%(variable)s_%(cmor_table)s_%(model)s_%(experiment)s_%(ensemble)s_%(period_start)s-%(period_end)s.nc"

[project.cmip6]
filename_format = "%(variable_id)s_%(table_id)s_%(source_id)s_%(experiment_id)s_%(member_id)s_%(grid_label)s_%(period_start)s-%(period_end)s.nc"

[project.cordex]
filename_format = "%(variable)s_%(domain)s_%(driving_model)s_%(experiment)s_%(ensemble)s_%(rcm_name)s_%(rcm_version)s_%(time_frequency)s_%(period_start)s-%(period_end)s.nc"
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: BTreeMap<String, ProjectConfig>,
    /// Where the configuration was read from, for error messages.
    #[serde(skip)]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Filename template with `%(name)s` placeholders.
    pub filename_format: String,
    /// Time units every file of the project is expected to use.
    #[serde(default)]
    pub time_units_default: Option<String>,
}

impl Config {
    /// Projects known without any configuration file.
    pub fn builtin() -> Self {
        let mut config: Self = toml::from_str(BUILTIN).unwrap_or_default();
        config.source = "built-in configuration".to_string();
        config
    }

    /// Read `nctime.toml` from the configuration directory, layered over the
    /// built-in projects. A missing file is not an error.
    pub fn load(explicit_dir: Option<&Path>) -> Result<Self> {
        let mut config = Self::builtin();
        let Some(dir) = config_dir(explicit_dir) else {
            return Ok(config);
        };
        let path = dir.join(CONFIG_FILENAME);
        if !path.is_file() {
            if explicit_dir.is_some() {
                tracing::warn!(path = %path.display(), "No configuration file, using built-in projects");
            }
            return Ok(config);
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let user: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), projects = user.project.len(), "Loaded configuration");

        for (name, project) in user.project {
            config.project.insert(name.to_lowercase(), project);
        }
        config.source = path.display().to_string();
        Ok(config)
    }

    pub fn project(&self, name: &str) -> std::result::Result<&ProjectConfig, NcTimeError> {
        self.project
            .get(&name.to_lowercase())
            .ok_or_else(|| NcTimeError::NoConfigSection {
                project: name.to_string(),
                source_name: self.source.clone(),
            })
    }
}

/// The configuration directory: `explicit`, else `$NCTIME_CONFIG_DIR`, else the
/// user configuration directory.
pub fn config_dir(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
        .or_else(|| dirs::config_dir().map(|d| d.join("nctime")))
}

/// Translate a `%(name)s` filename format into an anchored regular expression.
///
/// `period_start`/`period_end` (or `start_period`/`end_period`) become digit groups
/// named `period_start`/`period_end`; every other field matches `[\w.-]+`.
pub fn translate_filename_format(format: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    let mut rest = format;
    while let Some(open) = rest.find("%(") {
        pattern.push_str(&regex::escape(&rest[..open]));
        let after = &rest[open + 2..];
        let close = after
            .find(")s")
            .with_context(|| format!("Unterminated field in filename format '{format}'"))?;
        let field = match &after[..close] {
            "start_period" => "period_start",
            "end_period" => "period_end",
            other => other,
        };
        if field == "period_start" || field == "period_end" {
            pattern.push_str(&format!(r"(?P<{field}>\d+)"));
        } else {
            pattern.push_str(&format!(r"(?P<{field}>[\w.-]+)"));
        }
        rest = &after[close + 2..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');
    Regex::new(&pattern).with_context(|| format!("Invalid filename format '{format}'"))
}
