//! Archive locators: bounded HTTP download and zip extraction.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path};
use std::time::Duration;

use tracing::debug;

use super::error::{FetchError, FetchResult};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

/// GET `url` into memory, failing on non-2xx, timeout, or more than
/// `max_bytes` of body.
pub(crate) async fn download(
    client: &reqwest::Client,
    url: &str,
    timeout_secs: u64,
    max_bytes: u64,
) -> FetchResult<Vec<u8>> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            FetchError::Timeout { secs: timeout_secs }
        } else {
            FetchError::Transport(e.to_string())
        }
    };

    let mut response = client
        .get(url)
        .timeout(Duration::from_secs(timeout_secs))
        .send()
        .await
        .map_err(map_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if response.content_length().is_some_and(|len| len > max_bytes) {
        return Err(FetchError::TooLarge { limit: max_bytes });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(map_err)? {
        if body.len() as u64 + chunk.len() as u64 > max_bytes {
            return Err(FetchError::TooLarge { limit: max_bytes });
        }
        body.extend_from_slice(&chunk);
    }

    debug!(url = %url, bytes = body.len(), "archive downloaded");
    Ok(body)
}

/// Extract a zip archive into `dest`, preserving its internal structure.
///
/// Entries whose names would land outside `dest` (absolute, `..`, or through
/// a symlink created by an earlier entry) fail the whole extraction. Symlink
/// entries are recreated as symlinks on Unix so later verification sees
/// them. At most `max_bytes` of decompressed content is written in total.
/// Returns the number of entries written.
pub fn extract_zip(bytes: &[u8], dest: &Path, max_bytes: u64) -> FetchResult<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut written = 0usize;
    let mut remaining = max_bytes;
    let too_large = || FetchError::ExtractedTooLarge { limit: max_bytes };

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        let unsafe_entry = || FetchError::UnsafeArchiveEntry { name: name.clone() };

        let relative = entry.enclosed_name().ok_or_else(unsafe_entry)?;
        let relative = relative.to_path_buf();
        ensure_no_symlink_ancestor(dest, &relative).map_err(|_| unsafe_entry())?;
        let out = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(&out).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(unsafe_entry());
        }

        // Declared size first; the bounded reads below enforce the cap.
        if entry.size() > remaining {
            return Err(too_large());
        }

        let cap = remaining.saturating_add(1);
        let mode = entry.unix_mode();
        if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            let mut target = String::new();
            let read = (&mut entry).take(cap).read_to_string(&mut target)? as u64;
            remaining = remaining.checked_sub(read).ok_or_else(too_large)?;
            create_symlink(&target, &out)?;
        } else {
            let mut file = File::create(&out)?;
            let copied = io::copy(&mut (&mut entry).take(cap), &mut file)?;
            remaining = remaining.checked_sub(copied).ok_or_else(too_large)?;
            #[cfg(unix)]
            if let Some(mode) = mode {
                use std::os::unix::fs::PermissionsExt;
                // Permission bits only; no setuid/setgid/sticky.
                fs::set_permissions(&out, fs::Permissions::from_mode(mode & 0o777))?;
            }
        }
        written += 1;
    }

    Ok(written)
}

/// Fail when any existing ancestor of `relative` under `dest` is a symlink.
fn ensure_no_symlink_ancestor(dest: &Path, relative: &Path) -> io::Result<()> {
    let mut current = dest.to_path_buf();
    let parents: Vec<Component<'_>> = relative.components().collect();
    let ancestors = parents.len().saturating_sub(1);

    for component in parents.into_iter().take(ancestors) {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "archive path passes through a symlink",
                ))
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_symlink(target: &str, link: &Path) -> io::Result<()> {
    // Keep the entry visible as a plain file holding the link target.
    fs::write(link, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const LIMIT: u64 = 1024 * 1024;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            if name.ends_with('/') {
                writer
                    .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                    .unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_preserves_structure() {
        let bytes = build_zip(&[
            ("readme.txt", b"hello"),
            ("tool/", b""),
            ("tool/main.src", b"fn main() {}"),
        ]);
        let dest = tempfile::tempdir().unwrap();

        let written = extract_zip(&bytes, dest.path(), LIMIT).unwrap();
        assert_eq!(written, 2);
        assert_eq!(fs::read(dest.path().join("readme.txt")).unwrap(), b"hello");
        assert_eq!(
            fs::read_to_string(dest.path().join("tool/main.src")).unwrap(),
            "fn main() {}"
        );
    }

    #[test]
    fn test_extract_refuses_traversal_entries() {
        let bytes = build_zip(&[("ok.txt", b"1"), ("../escape.txt", b"2")]);
        let outer = tempfile::tempdir().unwrap();
        let dest = outer.path().join("sandbox");
        fs::create_dir(&dest).unwrap();

        let err = extract_zip(&bytes, &dest, LIMIT).unwrap_err();
        assert!(matches!(err, FetchError::UnsafeArchiveEntry { ref name } if name == "../escape.txt"));
        assert!(!outer.path().join("escape.txt").exists());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let dest = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract_zip(b"definitely not a zip", dest.path(), LIMIT),
            Err(FetchError::Archive(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_entries_are_materialized_and_not_followed() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_symlink("link", "/etc", SimpleFileOptions::default())
            .unwrap();
        writer
            .start_file("link/passwd", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"owned").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dest = tempfile::tempdir().unwrap();
        let err = extract_zip(&bytes, dest.path(), LIMIT).unwrap_err();
        assert!(matches!(err, FetchError::UnsafeArchiveEntry { .. }));
        assert!(fs::symlink_metadata(dest.path().join("link"))
            .unwrap()
            .file_type()
            .is_symlink());
    }

    #[test]
    fn test_extraction_stops_at_decompressed_limit() {
        // 64 KiB of zeros compresses to a few hundred bytes.
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let deflated =
            || SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file("small.txt", deflated()).unwrap();
        writer.write_all(b"fine").unwrap();
        writer.start_file("bomb.bin", deflated()).unwrap();
        writer.write_all(&vec![0u8; 64 * 1024]).unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(bytes.len() < 4096);

        let dest = tempfile::tempdir().unwrap();
        let err = extract_zip(&bytes, dest.path(), 16 * 1024).unwrap_err();
        assert!(matches!(err, FetchError::ExtractedTooLarge { limit } if limit == 16 * 1024));

        let extracted = fs::metadata(dest.path().join("bomb.bin")).map(|m| m.len()).unwrap_or(0);
        assert!(extracted <= 16 * 1024 + 1);
    }

    #[test]
    fn test_limit_counts_across_entries() {
        let bytes = build_zip(&[("a.txt", &[b'a'; 600]), ("b.txt", &[b'b'; 600])]);
        let dest = tempfile::tempdir().unwrap();

        assert!(extract_zip(&bytes, dest.path(), 1200).is_ok());

        let dest = tempfile::tempdir().unwrap();
        let err = extract_zip(&bytes, dest.path(), 1000).unwrap_err();
        assert!(matches!(err, FetchError::ExtractedTooLarge { limit: 1000 }));
    }
}
