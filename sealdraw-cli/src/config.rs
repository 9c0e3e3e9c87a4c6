use anyhow::Context as _;
use sealdraw_core::EngineSettings;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "config.json";

/// Optional `config.json` in the data directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Identity used when `--as` is not given. The first identity to open a
    /// data directory becomes the engine owner.
    pub identity: String,
    pub engine: EngineSettings,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            identity: "owner".to_string(),
            engine: EngineSettings::default(),
        }
    }
}

impl CliConfig {
    pub async fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.engine.validate()?;
        Ok(config)
    }
}
