// Artifact storage on disk.
//
// Generated files live flat in one output directory and are addressed only
// by file name: `music_<YYYYMMDD_HHMMSS>.mid` / `.wav`. The store writes each
// artifact once and reads it back for download; it never lists, rewrites or
// deletes files. Retention is somebody else's job.
//
// Names come from URLs, so `resolve` only accepts a single plain path
// component (no separators, no `..`, no leading dot).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("invalid artifact name: {0:?}")]
    InvalidName(String),
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("output I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The two file formats produced per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Midi,
    Wav,
}

impl ArtifactKind {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::Midi => "mid",
            ArtifactKind::Wav => "wav",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArtifactKind::Midi => "audio/midi",
            ArtifactKind::Wav => "audio/wav",
        }
    }

    /// Classify a file name by extension.
    pub fn from_file_name(name: &str) -> Option<ArtifactKind> {
        match Path::new(name).extension()?.to_str()? {
            "mid" => Some(ArtifactKind::Midi),
            "wav" => Some(ArtifactKind::Wav),
            _ => None,
        }
    }
}

/// File name for an artifact generated at `at`, second resolution.
pub fn artifact_name<Tz>(at: &DateTime<Tz>, kind: ArtifactKind) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("music_{}.{}", at.format("%Y%m%d_%H%M%S"), kind.extension())
}

/// A flat directory of generated artifacts.
#[derive(Debug, Clone)]
pub struct OutputStore {
    dir: PathBuf,
}

impl OutputStore {
    /// Open the store, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, OutputError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| OutputError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(OutputStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an artifact, replacing any file of the same name.
    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, OutputError> {
        let path = self.resolve(name)?;
        fs::write(&path, bytes).map_err(|source| OutputError::Io {
            path: path.clone(),
            source,
        })?;
        log::debug!("wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Read a previously written artifact.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, OutputError> {
        let path = self.resolve(name)?;
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => OutputError::NotFound(name.to_string()),
            _ => OutputError::Io { path, source },
        })
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, OutputError> {
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0'])
            && Path::new(name).file_name().is_some_and(|f| f == name);
        if !plain {
            return Err(OutputError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_artifact_names() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(7, 5, 30)
            .unwrap()
            .and_utc();
        assert_eq!(artifact_name(&at, ArtifactKind::Midi), "music_20240309_070530.mid");
        assert_eq!(artifact_name(&at, ArtifactKind::Wav), "music_20240309_070530.wav");
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(ArtifactKind::from_file_name("a.mid"), Some(ArtifactKind::Midi));
        assert_eq!(ArtifactKind::from_file_name("a.wav"), Some(ArtifactKind::Wav));
        assert_eq!(ArtifactKind::from_file_name("a.txt"), None);
        assert_eq!(ArtifactKind::from_file_name("noext"), None);
    }

    #[test]
    fn test_write_then_read() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path().join("static/output")).unwrap();
        assert!(store.dir().is_dir());

        let path = store.write("music_1.mid", b"MThd").unwrap();
        assert_eq!(path, store.dir().join("music_1.mid"));
        assert_eq!(store.read("music_1.mid").unwrap(), b"MThd");
    }

    #[test]
    fn test_missing_artifact() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path()).unwrap();
        assert!(matches!(
            store.read("music_missing.wav"),
            Err(OutputError::NotFound(name)) if name == "music_missing.wav"
        ));
    }

    #[test]
    fn test_rejects_non_plain_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path()).unwrap();
        for name in ["", "..", ".hidden", "../secret", "a/b.mid", "a\\b.mid", "/etc/passwd"] {
            assert!(
                matches!(store.read(name), Err(OutputError::InvalidName(_))),
                "{name:?} should be rejected"
            );
            assert!(matches!(
                store.write(name, b"x"),
                Err(OutputError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let store = OutputStore::open(tmp.path().join("out")).unwrap();
        std::fs::remove_dir(store.dir()).unwrap();
        assert!(matches!(
            store.write("music_x.wav", b"RIFF"),
            Err(OutputError::Io { .. })
        ));
    }
}
