//! Local model resolution and loading.
//!
//! Models are read from a fixed directory only. Nothing is ever downloaded and
//! no per-user cache is consulted; missing files are reported immediately.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use ort::session::Session;

use crate::error::{Error, Result};

/// Background segmentation models from the u2net family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum ModelKind {
    /// General purpose `IS-Net`.
    #[default]
    #[value(name = "isnet-general-use")]
    IsnetGeneralUse,
    /// Original `U^2-Net`.
    #[value(name = "u2net")]
    U2net,
    /// Lightweight `U^2-Net`.
    #[value(name = "u2netp")]
    U2netp,
    /// `IS-Net` tuned for anime illustrations.
    #[value(name = "isnet-anime")]
    IsnetAnime,
}

impl ModelKind {
    /// Every model the local directory must provide.
    pub const ALL: [Self; 4] = [Self::IsnetAnime, Self::IsnetGeneralUse, Self::U2net, Self::U2netp];

    /// Model name, as used for session lookup.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::IsnetGeneralUse => "isnet-general-use",
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::IsnetAnime => "isnet-anime",
        }
    }

    /// Get the filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::IsnetGeneralUse => "isnet-general-use.onnx",
            Self::U2net => "u2net.onnx",
            Self::U2netp => "u2netp.onnx",
            Self::IsnetAnime => "isnet-anime.onnx",
        }
    }

    /// Square input resolution expected by the network.
    #[must_use]
    pub const fn input_size(&self) -> u32 {
        match self {
            Self::IsnetGeneralUse | Self::IsnetAnime => 1024,
            Self::U2net | Self::U2netp => 320,
        }
    }

    /// Per-channel (mean, std) applied after scaling pixels to [0, 1].
    #[must_use]
    pub const fn normalization(&self) -> ([f32; 3], [f32; 3]) {
        match self {
            Self::IsnetGeneralUse | Self::IsnetAnime => ([0.5, 0.5, 0.5], [1.0, 1.0, 1.0]),
            Self::U2net | Self::U2netp => ([0.485, 0.456, 0.406], [0.229, 0.224, 0.225]),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A verified local model directory.
#[derive(Debug, Clone)]
pub struct ModelDir {
    dir: PathBuf,
}

impl ModelDir {
    /// Directory, relative to the application root, that holds the models.
    pub const RELATIVE: [&'static str; 2] = ["models", "u2net"];

    /// Resolve `<root>/models/u2net` and check that every model file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLocalAsset`] listing every absent file.
    pub fn from_root<P: AsRef<Path>>(root: P) -> Result<Self> {
        let dir = Self::RELATIVE
            .iter()
            .fold(root.as_ref().to_path_buf(), |path, part| path.join(part));
        Self::open(dir)
    }

    /// Use `dir` directly, checking that every model file exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingLocalAsset`] listing every absent file.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();

        let mut missing: Vec<String> = ModelKind::ALL
            .iter()
            .map(ModelKind::filename)
            .filter(|name| !dir.join(name).is_file())
            .map(ToString::to_string)
            .collect();
        missing.sort();

        if !missing.is_empty() {
            return Err(Error::MissingLocalAsset { dir, missing });
        }

        tracing::debug!("Using local model directory {}", dir.display());
        Ok(Self { dir })
    }

    /// The directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path to the file backing `kind`.
    #[must_use]
    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(kind.filename())
    }

    /// Load an ONNX model session.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load_session(&self, kind: ModelKind) -> Result<Session> {
        let path = self.model_path(kind);
        tracing::info!("Loading {kind} from {}", path.display());

        Session::builder()
            .map_err(|source| Error::ModelLoad {
                name: kind.filename().to_string(),
                source,
            })?
            .commit_from_file(&path)
            .map_err(|source| Error::ModelLoad {
                name: kind.filename().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_files_are_listed() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("models").join("u2net");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("u2net.onnx"), b"").unwrap();

        let err = ModelDir::from_root(root.path()).unwrap_err();
        match err {
            Error::MissingLocalAsset { dir: reported, missing } => {
                assert_eq!(reported, dir);
                assert_eq!(
                    missing,
                    vec!["isnet-anime.onnx", "isnet-general-use.onnx", "u2netp.onnx"]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_dir_reports_all() {
        let root = tempfile::tempdir().unwrap();

        let err = ModelDir::from_root(root.path()).unwrap_err();
        assert!(matches!(err, Error::MissingLocalAsset { ref missing, .. } if missing.len() == 4));
    }

    #[test]
    fn test_complete_dir_resolves_paths() {
        let root = tempfile::tempdir().unwrap();
        for kind in ModelKind::ALL {
            fs::write(root.path().join(kind.filename()), b"").unwrap();
        }

        let models = ModelDir::open(root.path()).unwrap();
        assert_eq!(models.path(), root.path());
        assert_eq!(
            models.model_path(ModelKind::U2netp),
            root.path().join("u2netp.onnx")
        );
    }

    #[test]
    fn test_model_names() {
        assert_eq!(ModelKind::default().name(), "isnet-general-use");
        assert_eq!(ModelKind::U2netp.input_size(), 320);
        assert_eq!(ModelKind::IsnetAnime.to_string(), "isnet-anime");
    }
}
