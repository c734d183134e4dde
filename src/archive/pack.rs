//! Pack an assembled root into a newc archive.

use std::fs::{self, File};
use std::io::BufWriter;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use regex::bytes::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::cpio::{Record, Writer};
use super::skeleton;
use crate::error::SourceryError;

/// What [`pack`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSummary {
    pub output: PathBuf,
    /// Records written, skeleton included, trailer excluded.
    pub records: usize,
    /// Entries skipped by the exclusion filter. A pruned directory counts once.
    pub excluded: usize,
    pub bytes: u64,
}

/// Compile the exclusions into one alternation. `None` when there are none.
///
/// The filter matches raw path bytes, so names that are not UTF-8 can still
/// be excluded.
pub fn exclusion_filter<S: AsRef<str>>(excludes: &[S]) -> Result<Option<Regex>, regex::Error> {
    if excludes.is_empty() {
        return Ok(None);
    }
    let joined = excludes
        .iter()
        .map(|e| e.as_ref())
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&joined).map(Some)
}

/// Archive name for `path` under `source`. The root itself is `.`.
fn archive_name(source: &Path, path: &Path) -> Option<Vec<u8>> {
    let rel = path.strip_prefix(source).ok()?;
    if rel.as_os_str().is_empty() {
        return Some(b".".to_vec());
    }
    Some(rel.as_os_str().as_bytes().to_vec())
}

/// Write the skeleton, then every non-excluded entry of `source` in lexical
/// depth-first order, then the trailer.
///
/// The archive is written beside `output` with a `.tmp` suffix and renamed
/// into place once complete.
pub fn pack<S: AsRef<str>>(
    source: &Path,
    output: &Path,
    excludes: &[S],
) -> Result<PackSummary, SourceryError> {
    let pack_err = |path: &Path, reason: String| SourceryError::Packaging {
        path: path.to_path_buf(),
        reason,
    };

    let filter = exclusion_filter(excludes)
        .map_err(|e| pack_err(output, format!("bad exclusion pattern: {}", e)))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| pack_err(parent, format!("creating directory: {}", e)))?;
    }

    let mut tmp = output.as_os_str().to_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    info!("pack {} into {}", source.display(), output.display());
    let result = write_archive(source, &tmp, filter.as_ref());
    let (records, excluded, bytes) = match result {
        Ok(counts) => counts,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };

    fs::rename(&tmp, output).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        pack_err(output, format!("renaming {}: {}", tmp.display(), e))
    })?;

    info!(
        "wrote {} records ({} excluded) to {}",
        records,
        excluded,
        output.display()
    );
    Ok(PackSummary {
        output: output.to_path_buf(),
        records,
        excluded,
        bytes,
    })
}

fn write_archive(
    source: &Path,
    tmp: &Path,
    filter: Option<&Regex>,
) -> Result<(usize, usize, u64), SourceryError> {
    let pack_err = |path: &Path, reason: String| SourceryError::Packaging {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::create(tmp).map_err(|e| pack_err(tmp, format!("creating: {}", e)))?;
    let mut writer = Writer::new(BufWriter::new(file));

    let skel = skeleton::root_records();
    writer
        .write_records(&skel)
        .map_err(|e| pack_err(tmp, format!("writing skeleton: {}", e)))?;
    let mut records = skel.len();
    let mut excluded = 0;

    let walker = WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skip = filter.map_or(false, |re| re.is_match(entry.path().as_os_str().as_bytes()));
            if skip {
                debug!("exclude {}", entry.path().display());
                excluded += 1;
            }
            !skip
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            pack_err(&path, format!("walking: {}", e))
        })?;
        let path = entry.path();
        let name = archive_name(source, path)
            .ok_or_else(|| pack_err(path, "not under the root".to_string()))?;
        let record =
            Record::from_path(path, &name).map_err(|e| pack_err(path, format!("reading: {}", e)))?;
        writer
            .write_record(&record)
            .map_err(|e| pack_err(path, format!("writing record: {}", e)))?;
        records += 1;
    }

    writer
        .write_trailer()
        .map_err(|e| pack_err(tmp, format!("writing trailer: {}", e)))?;
    writer
        .flush()
        .map_err(|e| pack_err(tmp, format!("flushing: {}", e)))?;
    let bytes = writer.written();

    let file = writer
        .into_inner()
        .into_inner()
        .map_err(|e| pack_err(tmp, format!("flushing: {}", e.error())))?;
    file.sync_all()
        .map_err(|e| pack_err(tmp, format!("syncing: {}", e)))?;

    Ok((records, excluded, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::cpio::{read_all, S_IFMT, S_IFREG};
    use std::ffi::OsStr;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::create_dir_all(root.join("src/proj/.git/objects")).unwrap();
        fs::create_dir_all(root.join("src/proj/testdata")).unwrap();
        fs::write(root.join("bin/hello"), b"#!/bin/sh\necho hi\n").unwrap();
        fs::set_permissions(root.join("bin/hello"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(root.join("src/proj/main.go"), b"package main\n").unwrap();
        fs::write(root.join("src/proj/.git/HEAD"), b"ref: refs/heads/main\n").unwrap();
        fs::write(root.join("src/proj/.git/objects/ab"), b"x").unwrap();
        fs::write(root.join("src/proj/testdata/in.txt"), b"fixture").unwrap();
        temp
    }

    #[test]
    fn test_round_trip_and_single_trailer() {
        let temp = tree();
        let root = temp.path().join("root");
        let out = temp.path().join("out/initramfs.cpio");

        let summary = pack(&root, &out, &["\\.git", "testdata"]).unwrap();
        assert_eq!(summary.output, out);
        assert!(!temp.path().join("out/initramfs.cpio.tmp").exists());

        let records = read_all(File::open(&out).unwrap()).unwrap();
        assert_eq!(records.len(), summary.records + 1);
        let trailers: Vec<_> = records.iter().filter(|r| r.is_trailer()).collect();
        assert_eq!(trailers.len(), 1);
        assert!(records.last().unwrap().is_trailer());

        let skel = skeleton::root_records();
        for (got, want) in records.iter().zip(skel.iter()) {
            assert_eq!(got, want);
        }

        let hello = records.iter().find(|r| r.info.name == b"bin/hello").unwrap();
        assert_eq!(hello.data, b"#!/bin/sh\necho hi\n");
        assert_eq!(hello.info.filesize as usize, hello.data.len());
        assert_eq!(hello.info.mode & S_IFMT, S_IFREG);
        assert_eq!(hello.info.mode & 0o777, 0o755);

        assert!(records.iter().any(|r| r.info.name == b"."));
        assert!(records.iter().any(|r| r.info.name == b"src/proj/main.go"));
    }

    #[test]
    fn test_excluded_directory_prunes_descendants() {
        let temp = tree();
        let root = temp.path().join("root");
        let out = temp.path().join("a.cpio");

        let summary = pack(&root, &out, &["\\.git", "testdata"]).unwrap();
        // .git and testdata, each counted once
        assert_eq!(summary.excluded, 2);

        let records = read_all(File::open(&out).unwrap()).unwrap();
        for r in &records {
            let name = r.info.display_name();
            assert!(!name.contains(".git"), "{}", name);
            assert!(!name.contains("testdata"), "{}", name);
        }
    }

    #[test]
    fn test_walk_is_lexical() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("r");
        for name in ["c", "a", "b"] {
            fs::create_dir_all(root.join(name)).unwrap();
            fs::write(root.join(name).join("f"), name).unwrap();
        }
        let out = temp.path().join("x.cpio");
        pack::<&str>(&root, &out, &[]).unwrap();

        let names: Vec<String> = read_all(File::open(&out).unwrap())
            .unwrap()
            .into_iter()
            .skip(skeleton::root_records().len())
            .map(|r| r.info.display_name().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![".", "a", "a/f", "b", "b/f", "c", "c/f", "TRAILER!!!"]
        );
    }

    #[test]
    fn test_non_utf8_names_are_packed_and_excludable() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        fs::create_dir_all(root.join("src")).unwrap();
        let cafe = OsStr::from_bytes(b"caf\xe9.txt");
        let skipped = OsStr::from_bytes(b"skip\xff");
        fs::write(root.join("src").join(cafe), b"latin-1").unwrap();
        fs::create_dir_all(root.join("src").join(skipped)).unwrap();
        fs::write(root.join("src").join(skipped).join("f"), b"x").unwrap();
        let out = temp.path().join("n.cpio");

        let summary = pack(&root, &out, &["skip"]).unwrap();
        assert_eq!(summary.excluded, 1);

        let records = read_all(File::open(&out).unwrap()).unwrap();
        let cafe = records
            .iter()
            .find(|r| r.info.name == b"src/caf\xe9.txt")
            .unwrap();
        assert_eq!(cafe.data, b"latin-1");
        assert!(!records.iter().any(|r| r.info.name.starts_with(b"src/skip")));
    }

    #[test]
    fn test_bad_pattern_is_packaging_error() {
        let temp = tree();
        let out = temp.path().join("bad.cpio");
        let err = pack(&temp.path().join("root"), &out, &["("]).unwrap_err();
        assert!(matches!(err, SourceryError::Packaging { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_source_leaves_no_archive() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("none.cpio");
        let err = pack::<&str>(&temp.path().join("missing"), &out, &[]).unwrap_err();
        assert!(matches!(err, SourceryError::Packaging { .. }));
        assert!(!out.exists());
        assert!(!temp.path().join("none.cpio.tmp").exists());
    }
}
