//! Content hashing for artifact uploads.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::UploadError;

/// A single file scheduled for upload, with its path relative to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute: PathBuf,
    /// Forward-slash separated; empty when the source is itself a file.
    pub relative: String,
}

/// Lists the files under `source` in a stable order.
pub fn collect_files(source: &Path) -> Result<Vec<SourceFile>, UploadError> {
    if source.is_file() {
        return Ok(vec![SourceFile {
            absolute: source.to_path_buf(),
            relative: String::new(),
        }]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| UploadError::InvalidSource(entry.path().display().to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        files.push(SourceFile {
            absolute: entry.path().to_path_buf(),
            relative,
        });
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// SHA-256 over every relative path and its bytes, in sorted path order.
pub fn content_hash(files: &[SourceFile]) -> Result<[u8; 32], UploadError> {
    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(std::fs::read(&file.absolute)?);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Stable identifier derived from the first half of the content hash.
pub fn content_id(hash: &[u8; 32]) -> uuid::Uuid {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    uuid::Uuid::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_tree(root: &Path) {
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::write(root.join("train.py"), "print('train')").unwrap();
        fs::write(root.join("pkg/util.py"), "X = 1").unwrap();
    }

    #[test]
    fn files_are_sorted_and_relative() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path());

        let files = collect_files(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["pkg/util.py", "train.py"]);
    }

    #[test]
    fn identical_trees_share_a_content_id() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_tree(a.path());
        write_tree(b.path());

        let hash_a = content_hash(&collect_files(a.path()).unwrap()).unwrap();
        let hash_b = content_hash(&collect_files(b.path()).unwrap()).unwrap();
        assert_eq!(content_id(&hash_a), content_id(&hash_b));

        fs::write(b.path().join("train.py"), "print('changed')").unwrap();
        let changed = content_hash(&collect_files(b.path()).unwrap()).unwrap();
        assert_ne!(content_id(&hash_a), content_id(&changed));
    }

    #[test]
    fn single_file_has_empty_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model.pkl");
        fs::write(&file, [1u8, 2, 3]).unwrap();

        let files = collect_files(&file).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].relative.is_empty());
    }
}
