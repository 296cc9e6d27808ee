use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage::StorageConfig;

/// On-disk configuration for a deployment: the upstream service URL and the
/// object-store backend. Loaded once at startup; `ClientConfig` is built from
/// it plus whatever per-run tuning (`fetch_threads`, `show_progress`, ...) the
/// caller supplies directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub theta_base_url: String,
    pub storage: StorageConfig,
}

fn xdg_config_home() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        let dir = PathBuf::from(dir);
        if dir.as_os_str().is_empty() {
            anyhow::bail!("XDG_CONFIG_HOME is set but empty");
        }
        return Ok(dir);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    let home = PathBuf::from(home);
    if home.as_os_str().is_empty() {
        anyhow::bail!("HOME is set but empty");
    }
    Ok(home.join(".config"))
}

pub fn deployment_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_home()?.join("theta-client").join("config.json"))
}

/// Read `~/.config/theta-client/config.json`, or `None` if it does not exist.
pub async fn load_deployment_config() -> anyhow::Result<Option<DeploymentConfig>> {
    let path = deployment_config_path()?;
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        let raw = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&raw)?))
    } else {
        Ok(None)
    }
}

pub async fn save_deployment_config(cfg: &DeploymentConfig) -> anyhow::Result<()> {
    let path = deployment_config_path()?;
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid config path: {}", path.display()))?;
    tokio::fs::create_dir_all(dir).await?;

    let json = serde_json::to_string_pretty(cfg)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let cfg = DeploymentConfig {
            theta_base_url: "http://127.0.0.1:25503/v3".to_string(),
            storage: StorageConfig::local_dev(),
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: DeploymentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.theta_base_url, cfg.theta_base_url);
        assert_eq!(back.storage.bucket, cfg.storage.bucket);
    }
}
