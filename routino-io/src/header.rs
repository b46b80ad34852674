//! Generic magic/version/CRC framing shared by every compact store file.
//!
//! Every `<prefix>-<store>.mem` file on disk is:
//!
//! ```text
//! [u32 magic][u16 version][store-specific header][body][u32 crc32]
//! ```
//!
//! The CRC covers everything before it (store header + body). Readers check
//! magic and version unconditionally and the CRC in debug builds or when
//! `--verify` is passed; writers always compute and append it.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use routino_common::FileError;

pub const MAGIC_NODES: u32 = 0x524e_4731; // "RNG1"
pub const MAGIC_SEGMENTS: u32 = 0x5253_4731; // "RSG1"
pub const MAGIC_WAYS: u32 = 0x5257_4731; // "RWY1"
pub const MAGIC_RELATIONS: u32 = 0x5252_4731; // "RRL1"

pub const FORMAT_VERSION: u16 = 1;

/// Writes `magic`, `version`, `header_bytes`, `body` and a trailing CRC32 of
/// everything that preceded it to `path`, via a temp-file-then-rename so a
/// crash or full disk never leaves a partial file in place (kind-5 error
/// handling, §7).
pub fn write_framed(
    path: &Path,
    magic: u32,
    version: u16,
    header_bytes: &[u8],
    body: &[u8],
) -> Result<(), FileError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| io_err(path, e))?;

    {
        let mut w = tmp.as_file();
        let mut crc = crc32fast::Hasher::new();

        write_and_hash(&mut w, &mut crc, &magic.to_ne_bytes(), path)?;
        write_and_hash(&mut w, &mut crc, &version.to_ne_bytes(), path)?;
        write_and_hash(&mut w, &mut crc, header_bytes, path)?;
        write_and_hash(&mut w, &mut crc, body, path)?;

        let digest = crc.finalize();
        w.write_all(&digest.to_ne_bytes()).map_err(|e| io_err(path, e))?;
        w.flush().map_err(|e| io_err(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| io_err(path, e.error))?;

    Ok(())
}

fn write_and_hash(
    w: &mut impl Write,
    crc: &mut crc32fast::Hasher,
    bytes: &[u8],
    path: &Path,
) -> Result<(), FileError> {
    w.write_all(bytes).map_err(|e| io_err(path, e))?;
    crc.update(bytes);
    Ok(())
}

/// The result of successfully reading and validating a framed file.
pub struct FramedFile {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
}

/// Reads and validates a framed file, checking magic, version and (if
/// `verify_crc`) the trailing CRC32.
pub fn read_framed(
    path: &Path,
    expected_magic: u32,
    expected_version: u16,
    header_len: usize,
    verify_crc: bool,
) -> Result<FramedFile, FileError> {
    let mut f = File::open(path).map_err(|e| io_err(path, e))?;
    let mut all = Vec::new();
    f.read_to_end(&mut all).map_err(|e| io_err(path, e))?;

    let min_len = 4 + 2 + header_len + 4;
    if all.len() < min_len {
        return Err(FileError::Truncated {
            path: owned(path),
            expected: min_len,
            found: all.len(),
        });
    }

    let magic = u32::from_ne_bytes(all[0..4].try_into().unwrap());
    if magic != expected_magic {
        return Err(FileError::BadMagic {
            path: owned(path),
            expected: expected_magic,
            found: magic,
        });
    }

    let version = u16::from_ne_bytes(all[4..6].try_into().unwrap());
    if version != expected_version {
        return Err(FileError::UnsupportedVersion {
            path: owned(path),
            expected: expected_version,
            found: version,
        });
    }

    let header = all[6..6 + header_len].to_vec();
    let body_end = all.len() - 4;
    let body = all[6 + header_len..body_end].to_vec();

    if verify_crc {
        let stored = u32::from_ne_bytes(all[body_end..].try_into().unwrap());
        let mut crc = crc32fast::Hasher::new();
        crc.update(&all[..body_end]);
        let computed = crc.finalize();
        if computed != stored {
            return Err(FileError::CrcMismatch {
                path: owned(path),
                expected: stored,
                computed,
            });
        }
    }

    Ok(FramedFile { header, body })
}

fn io_err(path: &Path, source: std::io::Error) -> FileError {
    FileError::Io {
        path: owned(path),
        source,
    }
}

fn owned(path: &Path) -> PathBuf {
    path.to_path_buf()
}

/// Removes a file if it exists, ignoring a "not found" error. Used to clean
/// up temp-directory X-store files once a build phase completes (§5).
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-nodes.mem");

        let header = 42u32.to_ne_bytes();
        let body = b"hello routing world";
        write_framed(&path, MAGIC_NODES, FORMAT_VERSION, &header, body).unwrap();

        let framed = read_framed(&path, MAGIC_NODES, FORMAT_VERSION, 4, true).unwrap();
        assert_eq!(framed.header, header);
        assert_eq!(framed.body, body);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-nodes.mem");
        write_framed(&path, MAGIC_NODES, FORMAT_VERSION, &[], b"x").unwrap();

        let err = read_framed(&path, MAGIC_SEGMENTS, FORMAT_VERSION, 0, true).unwrap_err();
        assert!(matches!(err, FileError::BadMagic { .. }));
    }

    #[test]
    fn corrupted_body_fails_crc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test-nodes.mem");
        write_framed(&path, MAGIC_NODES, FORMAT_VERSION, &[], b"payload").unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 5;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let err = read_framed(&path, MAGIC_NODES, FORMAT_VERSION, 0, true).unwrap_err();
        assert!(matches!(err, FileError::CrcMismatch { .. }));
    }
}
