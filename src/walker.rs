//
// walker.rs
// dicom-batch
//
// Enumerates the DICOM files below an input root, keeping each file's path relative to that root.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

/// File name suffix selecting which files enter a batch. Matching is case-sensitive.
pub const DICOM_EXTENSION: &str = ".dcm";

/// One file found by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Full path of the file on disk.
    pub path: PathBuf,
    /// Path of the file relative to the walker root.
    pub relative: PathBuf,
}

impl WalkedFile {
    /// Directory part of the relative path (empty for files directly under the root).
    pub fn relative_dir(&self) -> &Path {
        self.relative.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Bare file name, used to identify the file in log lines.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Target path for an output artifact: `output_root/<relative dir>/<file_name>`.
    pub fn mirrored_path(&self, output_root: &Path, file_name: &str) -> PathBuf {
        output_root.join(self.relative_dir()).join(file_name)
    }
}

/// Walks a directory tree lazily. Every call to [`DicomWalker::files`] restarts the walk.
///
/// Entries that cannot be read (permission errors on a subdirectory, entries that vanish
/// mid-walk) are skipped with a warning instead of failing the walk.
#[derive(Debug, Clone)]
pub struct DicomWalker {
    root: PathBuf,
}

impl DicomWalker {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn files(&self) -> impl Iterator<Item = WalkedFile> + '_ {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", self.root, err);
                    None
                }
            })
            // Regular files only; a link counts when its target is one.
            .filter(|entry| {
                entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
            })
            .filter(|entry| has_dicom_extension(entry.path()))
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&self.root).ok()?.to_path_buf();
                Some(WalkedFile {
                    path: entry.into_path(),
                    relative,
                })
            })
    }
}

fn has_dicom_extension(path: &Path) -> bool {
    path.file_name()
        .map_or(false, |name| {
            name.as_encoded_bytes()
                .ends_with(DICOM_EXTENSION.as_bytes())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn only_dcm_files_are_returned_recursively() {
        let root = tempdir().expect("tmpdir");
        touch(&root.path().join("a.dcm"));
        touch(&root.path().join("p1/b.dcm"));
        touch(&root.path().join("p1/deep/c.dcm"));
        touch(&root.path().join("p1/notes.txt"));
        touch(&root.path().join("p2/upper.DCM"));
        touch(&root.path().join("p2/a.dcm.bak"));
        fs::create_dir_all(root.path().join("folder.dcm")).unwrap();

        let walker = DicomWalker::new(root.path());
        let mut relative: Vec<_> = walker.files().map(|f| f.relative).collect();
        relative.sort();

        assert_eq!(
            relative,
            vec![
                PathBuf::from("a.dcm"),
                PathBuf::from("p1/b.dcm"),
                PathBuf::from("p1/deep/c.dcm"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_skipped() {
        let root = tempdir().expect("tmpdir");
        touch(&root.path().join("real/a.dcm"));
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("linked.dcm"))
            .unwrap();
        std::os::unix::fs::symlink(root.path().join("real/a.dcm"), root.path().join("b.dcm"))
            .unwrap();

        let walker = DicomWalker::new(root.path());
        let mut relative: Vec<_> = walker.files().map(|f| f.relative).collect();
        relative.sort();
        assert_eq!(
            relative,
            vec![PathBuf::from("b.dcm"), PathBuf::from("real/a.dcm")]
        );
    }

    #[test]
    fn walk_is_restartable() {
        let root = tempdir().expect("tmpdir");
        touch(&root.path().join("x/one.dcm"));
        touch(&root.path().join("two.dcm"));

        let walker = DicomWalker::new(root.path());
        assert_eq!(walker.files().count(), 2);
        assert_eq!(walker.files().count(), 2);
    }

    #[test]
    fn mirrored_path_keeps_subdirectories() {
        let file = WalkedFile {
            path: PathBuf::from("/in/sub/a.dcm"),
            relative: PathBuf::from("sub/a.dcm"),
        };
        assert_eq!(file.relative_dir(), Path::new("sub"));
        assert_eq!(
            file.mirrored_path(Path::new("/out"), "a.png"),
            PathBuf::from("/out/sub/a.png")
        );
        assert_eq!(file.display_name(), "a.dcm");

        let top = WalkedFile {
            path: PathBuf::from("/in/b.dcm"),
            relative: PathBuf::from("b.dcm"),
        };
        assert_eq!(
            top.mirrored_path(Path::new("/out"), "b.dcm"),
            PathBuf::from("/out/b.dcm")
        );
    }

    #[test]
    fn missing_root_yields_nothing() {
        let root = tempdir().expect("tmpdir");
        let walker = DicomWalker::new(root.path().join("absent"));
        assert_eq!(walker.files().count(), 0);
    }
}
