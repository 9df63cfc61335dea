//! Recursive discovery of `.c` input files, modeled on the teacher's own
//! `scan_dir`: directories are walked depth-first with sorted entries so the
//! resulting file list — and therefore the order diagnostics are produced in
//! before the final sort — is stable across runs and platforms.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Expands `inputs` (files or directories) into a sorted, deduplicated list
/// of `.c` source files. A file argument with a non-`.c` extension is
/// rejected outright: an explicit `--input foo.h` is almost certainly a
/// mistake, not something to silently skip.
pub(crate) fn collect_c_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        collect_path(input, &mut files)?;
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn collect_path(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if path.is_dir() {
        return collect_dir(path, files);
    }
    if path.extension().and_then(|ext| ext.to_str()) != Some("c") {
        anyhow::bail!("unsupported input file (expected a `.c` source): {}", path.display());
    }
    files.push(path.to_path_buf());
    Ok(())
}

fn collect_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("failed to read entry under {}", dir.display()))?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            collect_dir(&entry, files)?;
        } else if entry.extension().and_then(|ext| ext.to_str()) == Some("c") {
            files.push(entry);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_c_files_from_nested_directories_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.c"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.c"), "").unwrap();
        fs::write(dir.path().join("ignored.h"), "").unwrap();

        let files = collect_c_files(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(files, vec![dir.path().join("b.c"), dir.path().join("sub").join("a.c")]);
    }

    #[test]
    fn rejects_a_non_c_file_argument() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("foo.h");
        fs::write(&header, "").unwrap();
        assert!(collect_c_files(&[header]).is_err());
    }

    #[test]
    fn deduplicates_a_file_reachable_through_two_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.c");
        fs::write(&file, "").unwrap();
        let files = collect_c_files(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(files, vec![file]);
    }
}
