//! File discovery and stimulus/ground-truth consistency checks.
//!
//! Pairing of stimuli with their ground-truth maps is purely positional: both lists are
//! sorted by their full path string, and [`check_consistency`] verifies that every position
//! refers to the same base name. Anything that breaks this ordering must fail here, before
//! any sample is decoded.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::error::{DataError, DataResult};

/// Extensions (lowercase, without dot) of the files picked up by [`resolve_files`].
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "avi"];

/// Markers appended to a stimulus base name to form its ground-truth file names.
pub const GROUND_TRUTH_SUFFIXES: [&str; 2] = ["_fixMap", "_fixPts"];

/// Returns whether the path has one of the [`ACCEPTED_EXTENSIONS`], ignoring case.
pub fn is_accepted<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
}

/// Returns whether the path names a video container.
pub fn is_video<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("avi"))
}

/// Collects all stimulus or ground-truth files under `path`.
///
/// A path naming a single file yields exactly that file. A directory is walked recursively
/// and every entry with an accepted extension is kept. The result is sorted by full path
/// string.
///
/// # Errors
///
/// Returns [`DataError::NotFound`] if nothing was collected, and [`DataError::Io`] if the
/// directory tree cannot be read.
pub fn resolve_files<P: AsRef<Path>>(path: P) -> DataResult<Vec<PathBuf>> {
    let path = path.as_ref();
    let mut files = Vec::new();

    if path.is_file() {
        files.push(path.to_path_buf());
    } else if path.is_dir() {
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                let failed = e.path().map_or_else(|| path.to_path_buf(), Path::to_path_buf);
                DataError::io(failed, e.into())
            })?;

            if entry.file_type().is_file() && is_accepted(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }

    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

    if files.is_empty() {
        return Err(DataError::NotFound {
            path: path.to_path_buf(),
        });
    }

    tracing::debug!(path = %path.display(), count = files.len(), "resolved files");
    Ok(files)
}

/// Reduces a file path to the name shared by a stimulus and its ground truth: the file stem
/// with every [`GROUND_TRUTH_SUFFIXES`] marker removed.
pub fn base_name<P: AsRef<Path>>(path: P) -> String {
    let stem = path
        .as_ref()
        .file_stem()
        .map(OsStr::to_string_lossy)
        .unwrap_or_default();

    GROUND_TRUTH_SUFFIXES
        .iter()
        .fold(stem.into_owned(), |name, suffix| name.replace(suffix, ""))
}

/// Verifies that parallel file lists describe the same samples.
///
/// All lists must have the same length, their combined length must equal `expected_files`,
/// and at every position all entries must reduce to the same [`base_name`].
///
/// # Errors
///
/// Returns [`DataError::CountMismatch`] on any count violation and
/// [`DataError::NameMismatch`] for the first misaligned position.
pub fn check_consistency<P: AsRef<Path>>(lists: &[&[P]], expected_files: usize) -> DataResult<()> {
    let per_list = lists.first().map_or(0, |list| list.len());

    if let Some(uneven) = lists.iter().find(|list| list.len() != per_list) {
        return Err(DataError::CountMismatch {
            expected: per_list,
            actual: uneven.len(),
        });
    }

    let total = per_list * lists.len();
    if total != expected_files {
        return Err(DataError::CountMismatch {
            expected: expected_files,
            actual: total,
        });
    }

    for index in 0..per_list {
        let names: Vec<String> = lists.iter().map(|list| base_name(&list[index])).collect();

        if names.windows(2).any(|pair| pair[0] != pair[1]) {
            return Err(DataError::NameMismatch { index, names });
        }
    }

    tracing::debug!(files = total, lists = lists.len(), "file lists are consistent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn accepted_extensions_ignore_case() {
        assert!(is_accepted("a/b/img.PNG"));
        assert!(is_accepted("img.jpeg"));
        assert!(is_accepted("clip.AVI"));
        assert!(!is_accepted("notes.txt"));
        assert!(!is_accepted("no_extension"));
        assert!(is_video("clip.Avi"));
        assert!(!is_video("img.jpg"));
    }

    #[test]
    fn resolve_files_on_empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let result = resolve_files(dir.path());

        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }

    #[test]
    fn resolve_files_on_missing_path_is_not_found() {
        let dir = tempfile::tempdir().unwrap();

        let result = resolve_files(dir.path().join("missing"));

        assert!(matches!(result, Err(DataError::NotFound { .. })));
    }

    #[test]
    fn resolve_files_keeps_only_matching_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("img_001.jpg"), b"").unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();

        let files = resolve_files(dir.path()).unwrap();

        assert_eq!(files, vec![dir.path().join("img_001.jpg")]);
    }

    #[test]
    fn resolve_files_walks_recursively_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b/2.png"), b"").unwrap();
        fs::write(dir.path().join("a/9.png"), b"").unwrap();
        fs::write(dir.path().join("a/10.JPG"), b"").unwrap();

        let files = resolve_files(dir.path()).unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("a/10.JPG"),
                dir.path().join("a/9.png"),
                dir.path().join("b/2.png"),
            ]
        );
    }

    #[test]
    fn resolve_files_on_single_file_returns_it() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.avi");
        fs::write(&file, b"").unwrap();

        assert_eq!(resolve_files(&file).unwrap(), vec![file]);
    }

    #[test]
    fn base_name_strips_ground_truth_markers() {
        assert_eq!(base_name("stimuli/img_001.jpg"), "img_001");
        assert_eq!(base_name("saliency/img_001_fixMap.png"), "img_001");
        assert_eq!(base_name("fixations/img_001_fixPts.png"), "img_001");
    }

    #[test]
    fn matching_pair_passes() {
        let stimuli = ["img_001.jpg"];
        let saliency = ["img_001_fixMap.png"];

        assert!(check_consistency(&[&stimuli[..], &saliency[..]], 2).is_ok());
    }

    #[test]
    fn misaligned_pair_is_name_mismatch() {
        let stimuli = ["img_001.jpg"];
        let saliency = ["img_002_fixMap.png"];

        let result = check_consistency(&[&stimuli[..], &saliency[..]], 2);

        assert!(matches!(result, Err(DataError::NameMismatch { index: 0, .. })));
    }

    #[test]
    fn wrong_total_is_count_mismatch() {
        let stimuli = ["a.jpg", "b.jpg"];
        let saliency = ["a.png", "b.png"];

        let result = check_consistency(&[&stimuli[..], &saliency[..]], 2);

        assert!(matches!(
            result,
            Err(DataError::CountMismatch {
                expected: 2,
                actual: 4
            })
        ));
    }

    #[test]
    fn uneven_lists_are_count_mismatch() {
        let stimuli = ["a.jpg", "b.jpg"];
        let saliency = ["a.png"];

        let result = check_consistency(&[&stimuli[..], &saliency[..]], 3);

        assert!(matches!(result, Err(DataError::CountMismatch { .. })));
    }

    #[test]
    fn single_list_is_checked_by_count_only() {
        let stimuli = ["a.jpg", "b.jpg", "c.jpg"];

        assert!(check_consistency(&[&stimuli[..]], 3).is_ok());
    }
}
