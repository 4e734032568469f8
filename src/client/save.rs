//! # Artifact Saving
//!
//! A save is a scoped resource: acquire a transient handle in the target
//! location, write every byte, release it under its final name. Nothing keeps
//! a reference to the artifact afterwards.

use async_trait::async_trait;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Somewhere a finished artifact can be handed to the user.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// Store `artifact` under (a variant of) `filename` and return where it went.
    async fn save(&self, filename: &str, artifact: &[u8]) -> io::Result<PathBuf>;
}

/// Saves into a directory the way a browser download manager does: an
/// existing `model.obj` is never overwritten, the next one becomes
/// `model (1).obj`. This holds across concurrent saves and across processes
/// sharing the directory.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// `filename`, then `stem (1).ext`, `stem (2).ext`, ...
    fn candidates<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        let (stem, extension) = split_extension(filename);
        let numbered = (1u32..).map(move |n| match extension {
            Some(ext) => format!("{} ({}).{}", stem, n, ext),
            None => format!("{} ({})", stem, n),
        });
        std::iter::once(filename.to_string())
            .chain(numbered)
            .map(move |name| self.dir.join(name))
    }

    /// Give the finished `.part` file its final name.
    ///
    /// `hard_link` fails when the name is taken, so two saves racing for the
    /// same name cannot both win it and no existing file is replaced.
    async fn claim_name(&self, partial_path: &Path, filename: &str) -> io::Result<PathBuf> {
        for candidate in self.candidates(filename) {
            match fs::hard_link(partial_path, &candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name left for {}", filename),
        ))
    }
}

#[async_trait]
impl SaveTarget for DownloadDir {
    async fn save(&self, filename: &str, artifact: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let partial_path = self
            .dir
            .join(format!(".{}.{}.part", filename, uuid::Uuid::new_v4().simple()));

        // Acquire + write
        let written = async {
            let mut file = fs::File::create(&partial_path).await?;
            file.write_all(artifact).await?;
            file.sync_all().await
        }
        .await;

        // Release
        let claimed = match written {
            Ok(()) => self.claim_name(&partial_path, filename).await,
            Err(e) => Err(e),
        };
        let _ = fs::remove_file(&partial_path).await;

        let final_path = claimed?;
        debug!("Saved {} bytes to {}", artifact.len(), final_path.display());
        Ok(final_path)
    }
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}
