//! Engine configuration.
//!
//! Everything has a working default, so the engine runs with no config file
//! present. `load(path)` reads a TOML file and fills any missing section
//! with defaults; unknown keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::GraphError;

/// Spacing and collision tuning for [`crate::layout::LayoutEngine`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance from a parent to a newly placed child.
    pub horizontal_spacing: f64,
    /// Vertical step of the spiral search and of fallback placement.
    pub vertical_spacing: f64,
    /// Clearance added to every bounding box before collision checks.
    pub collision_padding: f64,
    /// Attempt bound for one spiral search.
    pub max_attempts: usize,
    /// Origin of the first tree during `auto_organize`.
    pub start_x: f64,
    pub start_y: f64,
    /// Horizontal gap between tree levels during `auto_organize`.
    pub level_gap_x: f64,
    /// Minimum vertical gap between stacked siblings.
    pub min_gap_y: f64,
    /// Clearance kept between locked frames and the free layout.
    pub frame_clearance: f64,
    /// Per-side padding used when sizing nodes during `auto_organize`.
    pub organize_padding: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_spacing: 300.0,
            vertical_spacing: 100.0,
            collision_padding: 30.0,
            max_attempts: 50,
            start_x: 50.0,
            start_y: 150.0,
            level_gap_x: 500.0,
            min_gap_y: 150.0,
            frame_clearance: 50.0,
            organize_padding: 40.0,
        }
    }
}

/// Curve construction and hit-testing tuning for
/// [`crate::route::ConnectionRouter`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Half-width of the stroke used for pointer containment tests.
    pub click_tolerance: f64,
    /// Upper bound on the horizontal Bezier control-point offset.
    pub control_cap: f64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            click_tolerance: 20.0,
            control_cap: 200.0,
        }
    }
}

/// Where the session database lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Explicit database path. `None` means `~/.canopy/chats.db`.
    pub db_path: Option<PathBuf>,
}

/// OpenAI-compatible provider settings (`[llm.openai]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:11434/v1/chat/completions".to_string(),
            model: "qwen2.5:3b".to_string(),
            temperature: 0.7,
            timeout_seconds: 120,
        }
    }
}

/// Which completion backend is active (`[llm]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `"dummy"` or `"openai"` / `"openai-compatible"`.
    pub provider: String,
    pub openai: OpenAiConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "dummy".to_string(),
            openai: OpenAiConfig::default(),
        }
    }
}

/// Fully-resolved engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub router: RouterConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
}

impl EngineConfig {
    /// Read a TOML config file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let text = fs::read_to_string(path)
            .map_err(|e| GraphError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| GraphError::Config(format!("malformed {}: {e}", path.display())))
    }

    /// Like [`EngineConfig::load`], but a missing file is not an error.
    pub fn load_or_default(path: &Path) -> Result<Self, GraphError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let c = EngineConfig::default();
        assert_eq!(c.layout.horizontal_spacing, 300.0);
        assert_eq!(c.layout.vertical_spacing, 100.0);
        assert_eq!(c.layout.collision_padding, 30.0);
        assert_eq!(c.router.click_tolerance, 20.0);
        assert_eq!(c.router.control_cap, 200.0);
        assert_eq!(c.llm.provider, "dummy");
        assert!(c.storage.db_path.is_none());
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let c: EngineConfig = toml::from_str(
            r#"
            [layout]
            horizontal_spacing = 250.0

            [llm]
            provider = "openai"
            "#,
        )
        .unwrap();
        assert_eq!(c.layout.horizontal_spacing, 250.0);
        // Untouched keys keep their defaults.
        assert_eq!(c.layout.vertical_spacing, 100.0);
        assert_eq!(c.llm.provider, "openai");
        assert_eq!(c.llm.openai.model, "qwen2.5:3b");
    }

    #[test]
    fn load_or_default_on_missing_file() {
        let c = EngineConfig::load_or_default(Path::new("/nonexistent/canopy.toml")).unwrap();
        assert_eq!(c.layout.max_attempts, 50);
    }
}
