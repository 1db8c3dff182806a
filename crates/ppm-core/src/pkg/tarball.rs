//! Tarball streaming and extraction.

use super::error::PkgError;
use super::registry::ByteStream;
use bytes::{Buf, Bytes};
use flate2::read::GzDecoder;
use futures::StreamExt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tokio::sync::mpsc;

/// Maximum tarball size (200 MB).
pub const MAX_TARBALL_SIZE: u64 = 200 * 1024 * 1024;

/// Chunks buffered between the download and the extracting thread.
const STREAM_CHANNEL_CAPACITY: usize = 16;

/// Blocking reader over chunks sent by an async download.
///
/// Returns end of file once the sender is dropped.
struct ChannelReader {
    rx: mpsc::Receiver<Bytes>,
    current: Bytes,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while !self.current.has_remaining() {
            match self.rx.blocking_recv() {
                Some(chunk) => self.current = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current.advance(n);
        Ok(n)
    }
}

/// Extract a tarball download into `dest` as it arrives.
///
/// Used when the content cache is disabled. Extraction runs on the blocking
/// pool and reads the body through a bounded channel, so at most a few
/// chunks are held in memory. If the download fails or exceeds `max_bytes`,
/// the download error is returned and `dest` is removed.
///
/// # Errors
/// Returns an error if the stream fails, exceeds `max_bytes`, or extraction
/// fails (see [`extract_tgz`]).
pub async fn extract_tgz_stream(
    mut stream: ByteStream,
    dest: PathBuf,
    max_bytes: u64,
) -> Result<usize, PkgError> {
    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let target = dest.clone();
    let extract = tokio::task::spawn_blocking(move || {
        let reader = ChannelReader {
            rx,
            current: Bytes::new(),
        };
        extract_tgz(reader, &target)
    });

    let mut received = 0u64;
    let mut download_error = None;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                download_error = Some(e);
                break;
            }
        };

        received += chunk.len() as u64;
        if received > max_bytes {
            download_error = Some(PkgError::download_failed(format!(
                "Tarball too large: more than {max_bytes} bytes"
            )));
            break;
        }

        // The extractor hung up early; its result says why
        if tx.send(chunk).await.is_err() {
            break;
        }
    }
    drop(tx);

    let extracted = extract
        .await
        .map_err(|e| PkgError::extract_failed(format!("Extraction task failed: {e}")))?;

    if let Some(e) = download_error {
        let _ = ppm_util::fs::remove_dir_all_if_exists(&dest);
        return Err(e);
    }

    extracted
}

/// Extract a gzipped tarball file (e.g. a cache entry) into `dest`.
///
/// # Errors
/// See [`extract_tgz`].
pub fn extract_tgz_file(archive: &Path, dest: &Path) -> Result<usize, PkgError> {
    let file = File::open(archive).map_err(|e| {
        PkgError::cache_error(format!("Failed to open '{}': {e}", archive.display()))
    })?;
    extract_tgz(BufReader::new(file), dest)
}

/// Extract a gzipped tarball into `dest`, stripping the first path component.
///
/// Registry tarballs wrap their contents in a single directory (usually
/// `package/`); every entry lands directly under `dest` instead. `dest` is
/// created if needed and is not cleared first, so files from an earlier
/// extraction that the new archive does not contain are left in place.
///
/// Returns the number of files written.
///
/// # Errors
/// Returns an error if the archive is not a valid gzipped tarball, contains
/// absolute or `..` paths, has no files, or a file cannot be written.
pub fn extract_tgz<R: Read>(reader: R, dest: &Path) -> Result<usize, PkgError> {
    fs::create_dir_all(dest).map_err(|e| write_failed(dest, &e))?;

    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut files = 0usize;

    for entry in archive
        .entries()
        .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entries: {e}")))?
    {
        let mut entry = entry
            .map_err(|e| PkgError::extract_failed(format!("Failed to read tarball entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| PkgError::extract_failed(format!("Failed to read entry path: {e}")))?
            .into_owned();

        let Some(relative) = strip_first_component(&path)? else {
            continue;
        };

        let dest_path = dest.join(&relative);
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            fs::create_dir_all(&dest_path).map_err(|e| write_failed(&dest_path, &e))?;
        } else if kind.is_file() {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(|e| write_failed(parent, &e))?;
            }

            let mut file = File::create(&dest_path).map_err(|e| write_failed(&dest_path, &e))?;
            io::copy(&mut entry, &mut file).map_err(|e| {
                PkgError::extract_failed(format!(
                    "Failed to extract '{}': {e}",
                    relative.display()
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let perms = fs::Permissions::from_mode(mode & 0o777);
                    let _ = fs::set_permissions(&dest_path, perms);
                }
            }

            files += 1;
        }
        // Skip symlinks and other special entries for security
    }

    if files == 0 {
        return Err(PkgError::extract_failed(
            "Tarball does not contain any files",
        ));
    }

    Ok(files)
}

/// Drop the wrapping directory from an entry path.
///
/// Returns `None` for the wrapper itself. Rejects absolute paths and `..`.
fn strip_first_component(path: &Path) -> Result<Option<PathBuf>, PkgError> {
    let path_str = path.to_string_lossy();
    let mut parts = Vec::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PkgError::extract_failed(format!(
                    "Tarball contains path traversal: {path_str}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PkgError::extract_failed(format!(
                    "Tarball contains absolute path: {path_str}"
                )));
            }
        }
    }

    if parts.len() < 2 {
        return Ok(None);
    }

    Ok(Some(parts[1..].iter().collect()))
}

fn write_failed(path: &Path, e: &io::Error) -> PkgError {
    PkgError::node_modules_write_failed(format!("Failed to write '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use futures::stream;
    use std::io::Write;
    use tar::Builder;
    use tempfile::tempdir;

    fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut tar_bytes = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_bytes);
            for (path, data) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_path(path).unwrap();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append(&header, data.as_bytes()).unwrap();
            }
            builder.finish().unwrap();
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_extract_strips_wrapper() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("node_modules").join("test");

        let tgz = tarball(&[
            ("package/package.json", r#"{"name":"test","version":"1.0.0"}"#),
            ("package/lib/index.js", "module.exports = 42;"),
        ]);
        let files = extract_tgz(tgz.as_slice(), &dest).unwrap();

        assert_eq!(files, 2);
        assert!(dest.join("package.json").exists());
        assert!(dest.join("lib").join("index.js").exists());
        assert!(!dest.join("package").exists());
    }

    #[test]
    fn test_extract_non_package_wrapper() {
        // @types/* tarballs use the bare package name as the wrapper
        let dir = tempdir().unwrap();
        let dest = dir.path().join("node");

        let tgz = tarball(&[("node/index.d.ts", "export {};")]);
        extract_tgz(tgz.as_slice(), &dest).unwrap();

        assert!(dest.join("index.d.ts").exists());
    }

    #[test]
    fn test_extract_merges_into_existing_dir() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pkg");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("stale.js"), "old").unwrap();
        fs::write(dest.join("index.js"), "old").unwrap();

        let tgz = tarball(&[("package/index.js", "new")]);
        extract_tgz(tgz.as_slice(), &dest).unwrap();

        assert_eq!(fs::read_to_string(dest.join("index.js")).unwrap(), "new");
        assert_eq!(fs::read_to_string(dest.join("stale.js")).unwrap(), "old");
    }

    #[test]
    fn test_extract_from_file() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg-1.0.0.tgz");
        fs::write(&archive, tarball(&[("package/index.js", "1")])).unwrap();

        let dest = dir.path().join("out");
        extract_tgz_file(&archive, &dest).unwrap();
        assert!(dest.join("index.js").exists());
    }

    #[test]
    fn test_reject_empty_tarball() {
        let dir = tempdir().unwrap();
        let result = extract_tgz(tarball(&[]).as_slice(), &dir.path().join("pkg"));
        assert_eq!(result.unwrap_err().code(), "PKG_EXTRACT_FAILED");
    }

    #[test]
    fn test_reject_garbage() {
        let dir = tempdir().unwrap();
        let result = extract_tgz(&b"not a tarball"[..], &dir.path().join("pkg"));
        assert_eq!(result.unwrap_err().code(), "PKG_EXTRACT_FAILED");
    }

    #[test]
    fn test_strip_first_component() {
        assert_eq!(
            strip_first_component(Path::new("package/a/b.js")).unwrap(),
            Some(PathBuf::from("a/b.js"))
        );
        assert_eq!(
            strip_first_component(Path::new("./package/a.js")).unwrap(),
            Some(PathBuf::from("a.js"))
        );
        assert_eq!(strip_first_component(Path::new("package/")).unwrap(), None);
        assert!(strip_first_component(Path::new("package/../../etc/passwd")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_strip_rejects_absolute() {
        assert!(strip_first_component(Path::new("/etc/passwd")).is_err());
    }

    /// Serve `bytes` as a download split into `size`-byte chunks.
    fn chunked(bytes: &[u8], size: usize) -> ByteStream {
        let chunks: Vec<Result<Bytes, PkgError>> = bytes
            .chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn test_extract_stream_in_chunks() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pkg");
        let tgz = tarball(&[
            ("package/package.json", r#"{"name":"pkg","version":"1.0.0"}"#),
            ("package/lib/index.js", "module.exports = 42;"),
        ]);

        let files = extract_tgz_stream(chunked(&tgz, 7), dest.clone(), MAX_TARBALL_SIZE)
            .await
            .unwrap();

        assert_eq!(files, 2);
        assert_eq!(
            fs::read_to_string(dest.join("lib").join("index.js")).unwrap(),
            "module.exports = 42;"
        );
    }

    #[tokio::test]
    async fn test_extract_stream_over_limit() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pkg");
        let tgz = tarball(&[("package/index.js", "1")]);

        let err = extract_tgz_stream(chunked(&tgz, 16), dest.clone(), 20)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PKG_DOWNLOAD_FAILED");
        assert!(err.message().contains("too large"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_extract_stream_error_wins_over_extract_error() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("pkg");
        let tgz = tarball(&[("package/index.js", "1")]);
        let chunks: Vec<Result<Bytes, PkgError>> = vec![
            Ok(Bytes::copy_from_slice(&tgz[..tgz.len() / 2])),
            Err(PkgError::download_failed("connection reset")),
        ];

        let err = extract_tgz_stream(stream::iter(chunks).boxed(), dest.clone(), MAX_TARBALL_SIZE)
            .await
            .unwrap_err();

        assert_eq!(err.code(), "PKG_DOWNLOAD_FAILED");
        assert!(err.message().contains("connection reset"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_extract_stream_garbage() {
        let dir = tempdir().unwrap();
        let err = extract_tgz_stream(
            chunked(b"not a tarball at all", 4),
            dir.path().join("pkg"),
            MAX_TARBALL_SIZE,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "PKG_EXTRACT_FAILED");
    }
}
