use super::DiagramGenerator;
use anyhow::{anyhow, Context, Result};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const DIAGRAM_PREFIX: &str = "results-";
const DIAGRAM_EXT: &str = ".png";

/// Drives the external size-function executable, which only speaks files:
/// it reads a mask image and writes `results-*.png` diagrams into a folder.
pub struct SizeFunctionTool {
    executable: PathBuf,
}

impl SizeFunctionTool {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

/// Lists the diagram files of `dir`, sorted by file name.
pub fn collect_diagrams(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut diagrams: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list diagrams in {:?}", dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|s| s.to_str())
                .map(|name| name.starts_with(DIAGRAM_PREFIX) && name.ends_with(DIAGRAM_EXT))
                .unwrap_or(false)
        })
        .collect();
    diagrams.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(diagrams)
}

impl DiagramGenerator for SizeFunctionTool {
    fn diagrams(
        &self,
        mask: &Mat,
        angle: u32,
        radius: u32,
        workdir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let results_dir = workdir.join("results");
        fs::create_dir_all(&results_dir)?;

        let mask_path = workdir.join("hand.png");
        let mask_str = mask_path
            .to_str()
            .ok_or_else(|| anyhow!("non UTF-8 scratch path {:?}", mask_path))?;
        if !imgcodecs::imwrite(mask_str, mask, &Vector::new())? {
            return Err(anyhow!("Failed to write mask image {:?}", mask_path));
        }

        let output = Command::new(&self.executable)
            .arg("--image")
            .arg(&mask_path)
            .arg("--angle")
            .arg(angle.to_string())
            .arg("--radius")
            .arg(radius.to_string())
            .arg("--out")
            .arg(&results_dir)
            .output()
            .with_context(|| format!("Failed to execute {:?}", self.executable))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{:?} exited with {}: {}",
                self.executable,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let diagrams = collect_diagrams(&results_dir)?;
        tracing::debug!("size function produced {} diagrams", diagrams.len());
        Ok(diagrams)
    }
}
