//! Tar archive helpers
//!
//! Extraction accepts plain or gzip-compressed tar (detected by magic bytes)
//! and writes every member through a staged file. Member paths that are
//! absolute or climb out of the destination are rejected.

use crate::error::ItemError;
use flate2::read::GzDecoder;
use opuskit_common::fs::StagedFile;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What an extraction produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub files: usize,
    pub bytes: u64,
}

fn is_gzip(path: &Path) -> io::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Normalize a relative path, rejecting anything that could escape its base
pub(crate) fn sanitize_member_path(raw: &Path) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Extract `archive` into `destination`
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<ExtractionReport, ItemError> {
    let gzip = is_gzip(archive).map_err(|e| ItemError::io(archive, e))?;
    let file = File::open(archive).map_err(|e| ItemError::io(archive, e))?;
    let reader: Box<dyn Read> = if gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut tar = tar::Archive::new(reader);
    let entries = tar.entries().map_err(|e| ItemError::archive(archive, e))?;

    let mut report = ExtractionReport::default();
    for entry in entries {
        let mut entry = entry.map_err(|e| ItemError::archive(archive, e))?;
        let raw_path = entry
            .path()
            .map_err(|e| ItemError::archive(archive, e))?
            .into_owned();
        let relative = sanitize_member_path(&raw_path).ok_or_else(|| {
            ItemError::archive(
                archive,
                format!("unsafe member path '{}'", raw_path.display()),
            )
        })?;
        let target = destination.join(&relative);

        let kind = entry.header().entry_type();
        if kind.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| ItemError::io(&target, e))?;
            continue;
        }
        if !kind.is_file() {
            debug!(member = %raw_path.display(), "Skipping non-file archive member");
            continue;
        }

        let expected = entry
            .header()
            .size()
            .map_err(|e| ItemError::archive(archive, e))?;
        let staged = StagedFile::new(&target)?;
        let mut out = File::create(staged.path()).map_err(|e| ItemError::io(staged.path(), e))?;
        let copied = io::copy(&mut entry, &mut out).map_err(|e| ItemError::archive(archive, e))?;
        if copied != expected {
            return Err(ItemError::archive(
                archive,
                format!(
                    "truncated member '{}': {copied} of {expected} bytes",
                    raw_path.display()
                ),
            ));
        }
        out.sync_all().map_err(|e| ItemError::io(staged.path(), e))?;
        drop(out);
        staged.commit()?;

        report.files += 1;
        report.bytes += copied;
    }

    debug!(
        archive = %archive.display(),
        files = report.files,
        bytes = report.bytes,
        "Archive extracted"
    );
    Ok(report)
}

/// Write a tar at `target` holding `members` as `(source file, name in archive)`
pub fn create_tar(members: &[(PathBuf, String)], target: &Path) -> Result<u64, ItemError> {
    let staged = StagedFile::new(target)?;
    let file = File::create(staged.path()).map_err(|e| ItemError::io(staged.path(), e))?;

    let mut builder = tar::Builder::new(file);
    for (source, name) in members {
        builder
            .append_path_with_name(source, name)
            .map_err(|e| ItemError::io(source, e))?;
    }
    let file = builder
        .into_inner()
        .map_err(|e| ItemError::io(staged.path(), e))?;
    file.sync_all().map_err(|e| ItemError::io(staged.path(), e))?;
    let size = file
        .metadata()
        .map_err(|e| ItemError::io(staged.path(), e))?
        .len();
    drop(file);

    staged.commit()?;
    Ok(size)
}

/// Extract every `*.tar` directly inside `dir` into `out`, in name order
pub fn unpack_dir(dir: &Path, out: &Path) -> Result<Vec<(PathBuf, ExtractionReport)>, ItemError> {
    let mut archives: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ItemError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tar"))
        .collect();
    archives.sort();

    let mut reports = Vec::with_capacity(archives.len());
    for archive in archives {
        let report = extract_archive(&archive, out)?;
        info!(archive = %archive.display(), files = report.files, "Unpacked shard");
        reports.push((archive, report));
    }
    Ok(reports)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    /// Build a tar in memory from `(name, contents)` pairs
    pub(crate) fn tar_bytes(members: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_sanitize_member_path() {
        assert_eq!(
            sanitize_member_path(Path::new("./07/12.mp3")),
            Some(PathBuf::from("07/12.mp3"))
        );
        assert_eq!(sanitize_member_path(Path::new("../etc/passwd")), None);
        assert_eq!(sanitize_member_path(Path::new("/etc/passwd")), None);
        assert_eq!(sanitize_member_path(Path::new("a/../../b")), None);
        assert_eq!(sanitize_member_path(Path::new(".")), None);
    }

    #[test]
    fn test_extract_plain_tar() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("blob.tar");
        std::fs::write(&archive, tar_bytes(&[("00/1.mp3", "one"), ("00/2.mp3", "two!")])).unwrap();

        let out = dir.path().join("out");
        let report = extract_archive(&archive, &out).unwrap();

        assert_eq!(report, ExtractionReport { files: 2, bytes: 7 });
        assert_eq!(std::fs::read(out.join("00/2.mp3")).unwrap(), b"two!");
    }

    #[test]
    fn test_extract_gzip_tar() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("blob.bin");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        io::Write::write_all(&mut encoder, &tar_bytes(&[("03/9.mp3", "nine")])).unwrap();
        std::fs::write(&archive, encoder.finish().unwrap()).unwrap();

        let out = dir.path().join("out");
        extract_archive(&archive, &out).unwrap();
        assert_eq!(std::fs::read(out.join("03/9.mp3")).unwrap(), b"nine");
    }

    #[test]
    fn test_corrupt_archive_is_archive_failure() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("blob.tar");
        std::fs::write(&archive, vec![0xAB; 1024]).unwrap();

        let result = extract_archive(&archive, dir.path());
        assert!(matches!(result, Err(ItemError::ArchiveFailure { .. })));
    }

    #[test]
    fn test_truncated_member_is_not_committed() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("blob.tar");
        let big = "x".repeat(4000);
        let bytes = tar_bytes(&[("00/1.mp3", "one"), ("00/2.mp3", &big)]);
        // keep the first member, the second header and 1000 bytes of its data
        let cut = 512 + 512 + 512 + 1000;
        std::fs::write(&archive, &bytes[..cut]).unwrap();

        let out = dir.path().join("out");
        let result = extract_archive(&archive, &out);

        match result {
            Err(ItemError::ArchiveFailure { reason, .. }) => assert!(reason.contains("truncated")),
            other => panic!("expected ArchiveFailure, got {other:?}"),
        }
        assert!(out.join("00/1.mp3").is_file());
        assert!(!out.join("00/2.mp3").exists());
    }

    #[test]
    fn test_create_and_unpack_dir() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("1.opus");
        let b = dir.path().join("2.opus");
        std::fs::write(&a, b"OggS-a").unwrap();
        std::fs::write(&b, b"OggS-b").unwrap();

        let shards = dir.path().join("shards");
        create_tar(
            &[(a, "1.opus".to_string()), (b, "2.opus".to_string())],
            &shards.join("0.tar"),
        )
        .unwrap();
        std::fs::write(shards.join("notes.txt"), b"ignored").unwrap();

        let out = dir.path().join("restored");
        let reports = unpack_dir(&shards, &out).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].1.files, 2);
        assert_eq!(std::fs::read(out.join("2.opus")).unwrap(), b"OggS-b");
    }
}
