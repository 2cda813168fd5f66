use super::{AssetWaker, WakeError};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Wakes an asset by starting its stopped compose service:
/// `docker compose -f <file> start <prefix><asset id lower-cased>`.
pub struct ComposeWaker {
    compose_file: PathBuf,
    container_prefix: String,
}

impl ComposeWaker {
    pub fn new(compose_file: impl Into<PathBuf>, container_prefix: impl Into<String>) -> Self {
        Self {
            compose_file: compose_file.into(),
            container_prefix: container_prefix.into(),
        }
    }

    pub fn container_name(&self, asset_id: &str) -> String {
        format!("{}{}", self.container_prefix, asset_id.to_lowercase())
    }

    fn command(&self, asset_id: &str) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("compose")
            .arg("-f")
            .arg(&self.compose_file)
            .arg("start")
            .arg(self.container_name(asset_id));
        cmd
    }
}

#[async_trait]
impl AssetWaker for ComposeWaker {
    async fn wake(&self, asset_id: &str) -> Result<(), WakeError> {
        let container = self.container_name(asset_id);
        debug!(asset_id = %asset_id, container = %container, "Starting container");

        let output = self.command(asset_id).output().await?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(WakeError::CommandFailed {
                asset_id: asset_id.to_string(),
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(())
    }
}
