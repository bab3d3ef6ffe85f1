// Per-request scratch area.
//
// Rasterized hand masks never leave the frame that produced them. A temporary
// directory exists only for collaborators that insist on file paths: each
// hand gets a folder keyed by (segment, frame, side), released as soon as its
// diagrams are read, and the whole tree goes when the `Scratch` is dropped.

use crate::pipeline::types::HandSide;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Address of one hand's artifacts within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    pub segment: usize,
    pub frame: usize,
    pub side: HandSide,
}

impl ArtifactKey {
    pub fn new(segment: usize, frame: usize, side: HandSide) -> Self {
        Self {
            segment,
            frame,
            side,
        }
    }
}

pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("sign-transcribe-")
            .tempdir()?;
        tracing::debug!("Created scratch area {:?}", dir.path());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn key_path(&self, key: ArtifactKey) -> PathBuf {
        self.dir
            .path()
            .join(format!("segment_{}", key.segment))
            .join(format!("frame_{}", key.frame))
            .join(format!("{}_hand", key.side.as_str()))
    }

    /// Creates (if needed) and returns the on-disk folder for `key`.
    pub fn dir_for(&self, key: ArtifactKey) -> io::Result<PathBuf> {
        let dir = self.key_path(key);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Deletes the folder for `key` and everything in it. Releasing a key that
    /// has no folder is a no-op.
    pub fn release(&self, key: ArtifactKey) -> io::Result<()> {
        match fs::remove_dir_all(self.key_path(key)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    /// Number of hand folders currently on disk.
    #[cfg(test)]
    pub(crate) fn live_dirs(&self) -> io::Result<usize> {
        let mut count = 0;
        for segment in fs::read_dir(self.dir.path())? {
            for frame in fs::read_dir(segment?.path())? {
                count += fs::read_dir(frame?.path())?.count();
            }
        }
        Ok(count)
    }

    /// Removes the area now, reporting failures instead of ignoring them.
    pub fn close(self) -> io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        tracing::debug!("Released scratch area {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_layout_and_cleanup_on_drop() {
        let scratch = Scratch::new().unwrap();
        let root = scratch.path().to_path_buf();
        let dir = scratch
            .dir_for(ArtifactKey::new(2, 7, HandSide::Right))
            .unwrap();

        assert!(dir.ends_with("segment_2/frame_7/right_hand"));
        assert!(dir.is_dir());

        drop(scratch);
        assert!(!root.exists());
    }

    #[test]
    fn test_close_removes_directory() {
        let scratch = Scratch::new().unwrap();
        let root = scratch.path().to_path_buf();
        scratch
            .dir_for(ArtifactKey::new(0, 0, HandSide::Left))
            .unwrap();
        scratch.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_release_removes_only_that_hand() {
        let scratch = Scratch::new().unwrap();
        let left = ArtifactKey::new(0, 1, HandSide::Left);
        let right = ArtifactKey::new(0, 1, HandSide::Right);
        let left_dir = scratch.dir_for(left).unwrap();
        fs::write(left_dir.join("results-000.png"), b"png").unwrap();
        let right_dir = scratch.dir_for(right).unwrap();
        assert_eq!(scratch.live_dirs().unwrap(), 2);

        scratch.release(left).unwrap();
        assert!(!left_dir.exists());
        assert!(right_dir.is_dir());
        assert_eq!(scratch.live_dirs().unwrap(), 1);

        scratch.release(left).unwrap();
        scratch.release(ArtifactKey::new(4, 4, HandSide::Left)).unwrap();
    }
}
