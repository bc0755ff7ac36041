//! Builds a [`ragflow_core::tenant_config::GlobalDefaults`] from a deployment
//! TOML file, loaded once at server startup (SPEC_FULL §4.10's level 1).
//!
//! Reuses [`crate::xdg_toml`]'s `$XDG_CONFIG_HOME/<app_name>/config.toml`
//! resolution, reading a `[global]` table instead of `[env]`.

use serde::Deserialize;
use thiserror::Error;

use ragflow_core::{CompactionStrategy, FallbackStrategy, GlobalDefaults};

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read config: {0}")]
    Read(std::io::Error),
    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize, Default)]
struct GlobalTable {
    #[serde(default)]
    global: GlobalSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GlobalSection {
    system_prompt: Option<String>,
    max_iterations: Option<u32>,
    temperature: Option<f32>,
    reflection_enabled: Option<bool>,
    allowed_tools: Vec<String>,
    vector_threshold: Option<f32>,
    keyword_threshold: Option<f32>,
    match_count: Option<usize>,
    rerank_top_k: Option<usize>,
    rerank_threshold: Option<f32>,
    compaction_strategy: Option<String>,
    compaction_window_size: Option<usize>,
    fallback_message: Option<String>,
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_iterations: None,
            temperature: None,
            reflection_enabled: None,
            allowed_tools: Vec::new(),
            vector_threshold: None,
            keyword_threshold: None,
            match_count: None,
            rerank_top_k: None,
            rerank_threshold: None,
            compaction_strategy: None,
            compaction_window_size: None,
            fallback_message: None,
        }
    }
}

fn xdg_config_path(app_name: &str) -> Result<Option<std::path::PathBuf>, DeploymentError> {
    let base = cross_xdg::BaseDirs::new().map_err(|e| DeploymentError::XdgPath(e.to_string()))?;
    let path = base.config_home().join(app_name).join("config.toml");
    Ok(if path.exists() { Some(path) } else { None })
}

/// Loads `$XDG_CONFIG_HOME/<app_name>/config.toml`'s `[global]` table into a
/// [`GlobalDefaults`]. A missing file or missing `[global]` table yields the
/// built-in defaults untouched.
pub fn load_global_defaults(app_name: &str) -> Result<GlobalDefaults, DeploymentError> {
    let mut defaults = GlobalDefaults::default();

    let Some(path) = xdg_config_path(app_name)? else {
        return Ok(defaults);
    };
    let content = std::fs::read_to_string(&path).map_err(DeploymentError::Read)?;
    let table: GlobalTable = toml::from_str(&content)?;
    let section = table.global;

    if let Some(v) = section.system_prompt {
        defaults.system_prompt = v;
    }
    if let Some(v) = section.max_iterations {
        defaults.max_iterations = v;
    }
    if let Some(v) = section.temperature {
        defaults.temperature = v;
    }
    if let Some(v) = section.reflection_enabled {
        defaults.reflection_enabled = v;
    }
    if !section.allowed_tools.is_empty() {
        defaults.allowed_tools = section.allowed_tools;
    }
    if let Some(v) = section.vector_threshold {
        defaults.search_params.vector_threshold = v;
    }
    if let Some(v) = section.keyword_threshold {
        defaults.search_params.keyword_threshold = v;
    }
    if let Some(v) = section.match_count {
        defaults.search_params.match_count = v;
    }
    if let Some(v) = section.rerank_top_k {
        defaults.rerank_config.top_k = v;
    }
    if let Some(v) = section.rerank_threshold {
        defaults.rerank_config.threshold = v;
    }
    if let Some(v) = section.compaction_strategy {
        defaults.compaction_config.strategy = match v.as_str() {
            "smart" => CompactionStrategy::Smart,
            _ => CompactionStrategy::SlidingWindow,
        };
    }
    if let Some(v) = section.compaction_window_size {
        defaults.compaction_config.window_size = v;
    }
    if let Some(v) = section.fallback_message {
        defaults.fallback = FallbackStrategy::Fixed(v);
    }

    Ok(defaults)
}
