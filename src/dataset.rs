//! Benchmark dataset download and extraction.
//!
//! The archive `<base_url>/<archive_name>` is expected to unpack into
//! `<dest>/<dataset>/train/<sequence>/` and `<dest>/<dataset>/test/<sequence>/`,
//! where `<dataset>` is the archive file stem (`MOT17.zip` -> `MOT17`).

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Location of an extracted dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub train_dir: PathBuf,
    pub test_dir: PathBuf,
}

impl DatasetLayout {
    /// Expected layout of `<dest>/<name>`.
    pub fn at<P: AsRef<Path>>(dest_dir: P, name: &str) -> Self {
        let root = dest_dir.as_ref().join(name);
        Self {
            train_dir: root.join("train"),
            test_dir: root.join("test"),
            root,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.train_dir.is_dir() && self.test_dir.is_dir()
    }
}

/// Dataset name for an archive file name: its stem.
pub fn dataset_name(archive_name: &str) -> &str {
    Path::new(archive_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(archive_name)
}

/// Download and extract a dataset archive unless it is already present.
///
/// With `exist_ok` set and both `train/` and `test/` in place, this returns
/// without touching the network or the filesystem. Failures are not retried.
pub fn fetch_dataset<P: AsRef<Path>>(
    base_url: &str,
    archive_name: &str,
    dest_dir: P,
    exist_ok: bool,
) -> Result<DatasetLayout> {
    let dest_dir = dest_dir.as_ref();
    let layout = DatasetLayout::at(dest_dir, dataset_name(archive_name));

    if exist_ok && layout.is_complete() {
        info!(root = %layout.root.display(), "dataset already present");
        return Ok(layout);
    }

    fs::create_dir_all(dest_dir)?;
    let url = format!("{}/{}", base_url.trim_end_matches('/'), archive_name);
    let archive_path = dest_dir.join(archive_name);

    download(&url, &archive_path)?;
    let extracted = extract_archive(&archive_path, dest_dir);
    if let Err(e) = fs::remove_file(&archive_path) {
        warn!(path = %archive_path.display(), error = %e, "could not remove archive");
    }
    let num_files = extracted?;
    info!(root = %layout.root.display(), files = num_files, "dataset extracted");

    if !layout.is_complete() {
        return Err(Error::DatasetLayout(format!(
            "expected {:?} and {:?} after extracting {}",
            layout.train_dir, layout.test_dir, archive_name
        )));
    }
    Ok(layout)
}

/// Download `url` to `target`. A partial file is removed on failure.
fn download(url: &str, target: &Path) -> Result<()> {
    info!(url, target = %target.display(), "downloading");
    let fetch_error = |reason: String| Error::Fetch {
        url: url.to_string(),
        reason,
    };

    let response = ureq::get(url)
        .call()
        .map_err(|e| fetch_error(e.to_string()))?;

    let mut reader = response.into_reader();
    let mut file = File::create(target)?;
    if let Err(e) = io::copy(&mut reader, &mut file) {
        drop(file);
        let _ = fs::remove_file(target);
        return Err(fetch_error(e.to_string()));
    }
    Ok(())
}

/// Extract a zip archive into `dest_dir`, returning the number of files written.
///
/// Entries whose path would land outside `dest_dir` are skipped.
pub fn extract_archive<P1: AsRef<Path>, P2: AsRef<Path>>(archive_path: P1, dest_dir: P2) -> Result<usize> {
    let archive_path = archive_path.as_ref();
    let dest_dir = dest_dir.as_ref();
    let archive_error = |reason: String| Error::Archive {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;

    let mut num_files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out).map_err(|e| archive_error(e.to_string()))?;
        debug!(path = %out_path.display(), "extracted");
        num_files += 1;
    }
    Ok(num_files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_dataset_name() {
        assert_eq!(dataset_name("MOT17.zip"), "MOT17");
        assert_eq!(dataset_name("MOT20"), "MOT20");
    }

    #[test]
    fn test_exist_ok_skips_download() {
        let dest = TempDir::new().unwrap();
        let layout = DatasetLayout::at(dest.path(), "MOT17");
        fs::create_dir_all(&layout.train_dir).unwrap();
        fs::create_dir_all(&layout.test_dir).unwrap();
        let marker = layout.train_dir.join("keep.txt");
        fs::write(&marker, "unchanged").unwrap();

        // The URL is never contacted.
        let fetched = fetch_dataset("http://invalid.invalid", "MOT17.zip", dest.path(), true).unwrap();
        let again = fetch_dataset("http://invalid.invalid", "MOT17.zip", dest.path(), true).unwrap();

        assert_eq!(fetched, layout);
        assert_eq!(again, layout);
        assert_eq!(fs::read_to_string(&marker).unwrap(), "unchanged");
        assert!(!dest.path().join("MOT17.zip").exists());
    }

    #[test]
    fn test_unreachable_remote_is_fetch_error() {
        let dest = TempDir::new().unwrap();
        let err = fetch_dataset("http://127.0.0.1:9", "MOT17.zip", dest.path(), true).unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(!dest.path().join("MOT17.zip").exists());
    }

    #[test]
    fn test_http_error_status_is_fetch_error() {
        use std::io::{BufRead, BufReader};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = stream;
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .unwrap();
        });

        let dest = TempDir::new().unwrap();
        let err = fetch_dataset(&base_url, "MOT17.zip", dest.path(), false).unwrap_err();
        server.join().unwrap();

        match err {
            Error::Fetch { url, reason } => {
                assert!(url.ends_with("/MOT17.zip"));
                assert!(reason.contains("404"), "{}", reason);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.path().join("MOT17.zip").exists());
    }

    #[test]
    fn test_extract_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("MOT17.zip");
        write_zip(
            &archive,
            &[
                ("MOT17/train/", ""),
                ("MOT17/train/MOT17-02/gt/gt.txt", "1,1,0,0,10,10,1,1,1\n"),
                ("MOT17/test/", ""),
            ],
        );

        let dest = dir.path().join("data");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 1);

        let layout = DatasetLayout::at(&dest, "MOT17");
        assert!(layout.is_complete());
        let gt = fs::read_to_string(layout.train_dir.join("MOT17-02/gt/gt.txt")).unwrap();
        assert_eq!(gt, "1,1,0,0,10,10,1,1,1\n");
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"this is not a zip file").unwrap();

        let err = extract_archive(&archive, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }

    #[test]
    fn test_unsafe_entries_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(&archive, &[("../escape.txt", "x"), ("ok.txt", "y")]);

        let dest = dir.path().join("out");
        assert_eq!(extract_archive(&archive, &dest).unwrap(), 1);
        assert!(!dir.path().join("escape.txt").exists());
        assert!(dest.join("ok.txt").exists());
    }
}
