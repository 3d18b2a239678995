use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The two well-known outputs of a run. Both are fully replaced every run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunArtifacts {
    pub video: PathBuf,
    pub metrics: PathBuf,
}

impl RunArtifacts {
    pub fn new(video: impl Into<PathBuf>, metrics: impl Into<PathBuf>) -> Self {
        Self {
            video: video.into(),
            metrics: metrics.into(),
        }
    }

    /// Delete outputs of any previous run and make sure the target
    /// directories exist.
    pub fn prepare(&self) -> Result<()> {
        for path in [&self.video, &self.metrics] {
            remove_if_present(path)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        Ok(())
    }

    /// Best-effort removal after a failed start.
    pub fn discard(&self) {
        for path in [&self.video, &self.metrics] {
            if let Err(err) = remove_if_present(path) {
                log::warn!("failed to remove {}: {:#}", path.display(), err);
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("removed stale artifact {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_removes_stale_outputs_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        std::fs::create_dir(&media).unwrap();
        let artifacts = RunArtifacts::new(
            media.join("final_demo.y4m"),
            dir.path().join("out/demo_data.json"),
        );
        std::fs::write(&artifacts.video, b"old").unwrap();

        artifacts.prepare().unwrap();
        assert!(!artifacts.video.exists());
        assert!(!artifacts.metrics.exists());
        assert!(dir.path().join("out").is_dir());

        // idempotent when nothing is left to remove
        artifacts.prepare().unwrap();
    }
}
