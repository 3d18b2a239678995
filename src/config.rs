use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{BackendRegistry, ReplayBackend, SharedBackend, StubBackend};
use crate::emit::OverlayStyle;
use crate::engagement::{
    EngagementRules, ScoringPolicy, DEFAULT_DISENGAGED_CLASSES, DEFAULT_ENGAGED_CLASSES,
    DEFAULT_SESSION_DAMPING,
};
use crate::ingest::FileConfig;
use crate::pipeline::{PipelineSettings, RunArtifacts};

const DEFAULT_INPUT_PATH: &str = "media/trial2.y4m";
const DEFAULT_OUTPUT_VIDEO_PATH: &str = "media/final_demo.y4m";
const DEFAULT_OUTPUT_METRICS_PATH: &str = "media/demo_data.json";
const DEFAULT_API_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_BACKEND: &str = "replay";
const DEFAULT_REPLAY_PATH: &str = "weights/tracks.json";

#[derive(Debug, Deserialize, Default)]
struct EngineConfigFile {
    input_path: Option<String>,
    output_video_path: Option<PathBuf>,
    output_metrics_path: Option<PathBuf>,
    api: Option<ApiConfigFile>,
    backend: Option<BackendConfigFile>,
    engagement: Option<EngagementConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct BackendConfigFile {
    name: Option<String>,
    replay_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct EngagementConfigFile {
    engaged_classes: Option<Vec<String>>,
    disengaged_classes: Option<Vec<String>>,
    session_damping: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    draw_boxes: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub input_path: String,
    pub output_video_path: PathBuf,
    pub output_metrics_path: PathBuf,
    pub api_addr: String,
    pub backend: BackendSettings,
    pub engagement: EngagementSettings,
    pub draw_boxes: bool,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub name: String,
    pub replay_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EngagementSettings {
    pub engaged_classes: Vec<String>,
    pub disengaged_classes: Vec<String>,
    pub session_damping: f64,
}

impl EngineConfig {
    /// Load from `ENGAGEMENT_CONFIG` (JSON, or TOML by extension), then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ENGAGEMENT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: EngineConfigFile) -> Self {
        let engagement = file.engagement.unwrap_or_default();
        let backend = file.backend.unwrap_or_default();
        Self {
            input_path: file
                .input_path
                .unwrap_or_else(|| DEFAULT_INPUT_PATH.to_string()),
            output_video_path: file
                .output_video_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_VIDEO_PATH)),
            output_metrics_path: file
                .output_metrics_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_METRICS_PATH)),
            api_addr: file
                .api
                .and_then(|api| api.addr)
                .unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            backend: BackendSettings {
                name: backend.name.unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
                replay_path: backend
                    .replay_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_REPLAY_PATH)),
            },
            engagement: EngagementSettings {
                engaged_classes: engagement
                    .engaged_classes
                    .unwrap_or_else(|| to_strings(DEFAULT_ENGAGED_CLASSES)),
                disengaged_classes: engagement
                    .disengaged_classes
                    .unwrap_or_else(|| to_strings(DEFAULT_DISENGAGED_CLASSES)),
                session_damping: engagement
                    .session_damping
                    .unwrap_or(DEFAULT_SESSION_DAMPING),
            },
            draw_boxes: file.overlay.and_then(|o| o.draw_boxes).unwrap_or(true),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("ENGAGEMENT_INPUT") {
            self.input_path = path;
        }
        if let Some(path) = non_empty_env("ENGAGEMENT_OUTPUT_VIDEO") {
            self.output_video_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("ENGAGEMENT_OUTPUT_METRICS") {
            self.output_metrics_path = PathBuf::from(path);
        }
        if let Some(addr) = non_empty_env("ENGAGEMENT_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(name) = non_empty_env("ENGAGEMENT_BACKEND") {
            self.backend.name = name;
        }
        if let Some(path) = non_empty_env("ENGAGEMENT_REPLAY_PATH") {
            self.backend.replay_path = PathBuf::from(path);
        }
        if let Some(classes) = non_empty_env("ENGAGEMENT_ENGAGED_CLASSES") {
            self.engagement.engaged_classes = split_csv(&classes);
        }
        if let Some(classes) = non_empty_env("ENGAGEMENT_DISENGAGED_CLASSES") {
            self.engagement.disengaged_classes = split_csv(&classes);
        }
        if let Some(damping) = non_empty_env("ENGAGEMENT_SESSION_DAMPING") {
            self.engagement.session_damping = damping
                .trim()
                .parse()
                .map_err(|_| anyhow!("ENGAGEMENT_SESSION_DAMPING must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_path.trim().is_empty() {
            return Err(anyhow!("input_path must not be empty"));
        }
        if self.output_video_path.as_os_str().is_empty()
            || self.output_metrics_path.as_os_str().is_empty()
        {
            return Err(anyhow!("output paths must not be empty"));
        }
        if self.output_video_path == self.output_metrics_path {
            return Err(anyhow!("output video and metrics paths must differ"));
        }
        let damping = self.engagement.session_damping;
        if !damping.is_finite() || !(0.0..=1.0).contains(&damping) {
            return Err(anyhow!("session_damping must be within [0, 1]"));
        }
        if self.engagement.engaged_classes.is_empty() {
            return Err(anyhow!("engaged_classes must not be empty"));
        }
        let overlap = self.rules().overlapping().join(", ");
        if !overlap.is_empty() {
            log::warn!(
                "classes listed as both engaged and disengaged count as engaged: {}",
                overlap
            );
        }
        Ok(())
    }

    pub fn rules(&self) -> EngagementRules {
        EngagementRules::new(
            self.engagement.engaged_classes.iter().cloned(),
            self.engagement.disengaged_classes.iter().cloned(),
        )
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            rules: self.rules(),
            scoring: ScoringPolicy {
                session_damping: self.engagement.session_damping,
            },
            overlay: OverlayStyle {
                draw_boxes: self.draw_boxes,
                ..OverlayStyle::default()
            },
        }
    }

    pub fn artifacts(&self) -> RunArtifacts {
        RunArtifacts::new(&self.output_video_path, &self.output_metrics_path)
    }

    pub fn input(&self) -> FileConfig {
        FileConfig::new(self.input_path.clone())
    }
}

impl BackendSettings {
    /// Load the tracker backends once. The configured one becomes the default.
    pub fn build_registry(&self) -> Result<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        if self.name == "replay" {
            let replay = ReplayBackend::open(&self.replay_path).map_err(|e| {
                anyhow!(
                    "failed to load replay tracker {}: {}",
                    self.replay_path.display(),
                    e
                )
            })?;
            registry.register(replay);
        }
        registry.set_default(&self.name)?;
        Ok(registry)
    }

    pub fn load(&self) -> Result<SharedBackend> {
        let registry = self.build_registry()?;
        log::info!(
            "tracker backends: {} (using '{}')",
            registry.list().join(", "),
            self.name
        );
        registry
            .default_backend()
            .ok_or_else(|| anyhow!("backend '{}' not registered", self.name))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_file(EngineConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<EngineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
