use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::NamedTempFile;

use crate::container::{Header, COMPRESSED_EXTENSION};
use crate::error::{Error, Result};
use crate::{decode_payload, encode};

/// marker added to the name of a decompressed file
const DECOMPRESSED_SUFFIX: &str = "(unzp)";

/// What to do with a file, decided by its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Compress,
    Decompress,
}

impl Mode {
    pub fn detect(path: &Path) -> Mode {
        if split_extension(path).1 == OsStr::new(COMPRESSED_EXTENSION) {
            Mode::Decompress
        } else {
            Mode::Compress
        }
    }
}

/// Splits the file name at its last dot into name and extension. The
/// extension is empty when there is none.
pub fn split_extension(path: &Path) -> (&OsStr, &OsStr) {
    let none = OsStr::new("");
    (
        path.file_stem().unwrap_or(none),
        path.extension().unwrap_or(none),
    )
}

#[cfg(unix)]
fn extension_to_bytes(_path: &Path, extension: &OsStr) -> Result<Vec<u8>> {
    use std::os::unix::ffi::OsStrExt;
    Ok(extension.as_bytes().to_vec())
}

#[cfg(not(unix))]
fn extension_to_bytes(path: &Path, extension: &OsStr) -> Result<Vec<u8>> {
    match extension.to_str() {
        Some(extension) => Ok(extension.as_bytes().to_vec()),
        None => Err(Error::format_mismatch(
            path,
            "extension is not valid UTF-8 and cannot be stored",
        )),
    }
}

#[cfg(unix)]
fn extension_from_bytes(extension: &[u8]) -> Result<&OsStr> {
    use std::os::unix::ffi::OsStrExt;
    Ok(OsStr::from_bytes(extension))
}

#[cfg(not(unix))]
fn extension_from_bytes(extension: &[u8]) -> Result<&OsStr> {
    std::str::from_utf8(extension)
        .map(OsStr::new)
        .map_err(|_| Error::invalid_input("stored extension is not valid UTF-8"))
}

/// `<dir>/<name>.hcmp`
pub fn compressed_path(path: &Path) -> PathBuf {
    path.with_extension(COMPRESSED_EXTENSION)
}

/// `<dir>/<name>(unzp).<extension>`, or `<dir>/<name>(unzp)` when the
/// original had no extension
pub fn decompressed_path(path: &Path, extension: &[u8]) -> Result<PathBuf> {
    let (stem, _) = split_extension(path);
    let mut name = OsString::from(stem);
    name.push(DECOMPRESSED_SUFFIX);
    if !extension.is_empty() {
        name.push(".");
        name.push(extension_from_bytes(extension)?);
    }
    Ok(path.with_file_name(name))
}

/// Runs `write` against a temporary file next to `dest` and moves it into
/// place only if `write` succeeds, so a failure never leaves a partial
/// output behind.
fn write_atomically<T, F>(dest: &Path, write: F) -> Result<T>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<T>,
{
    let dir = match dest.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    let mut out = BufWriter::new(temp.as_file_mut());
    let value = write(&mut out)?;
    out.flush()?;
    drop(out);
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(value)
}

/// Compresses `path` into `output`, or into `<name>.hcmp` next to it.
pub fn compress_file(path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    if Mode::detect(path) == Mode::Decompress {
        return Err(Error::format_mismatch(
            path,
            format!("already a .{COMPRESSED_EXTENSION} file"),
        ));
    }
    let extension = extension_to_bytes(path, split_extension(path).1)?;
    let input = BufReader::new(File::open(path)?);
    let dest = output.map_or_else(|| compressed_path(path), Path::to_path_buf);
    debug!("compressing {} into {}", path.display(), dest.display());

    let summary = write_atomically(&dest, |out| encode(input, out, &extension))?;
    info!(
        "{}: {} bytes, {} symbols, {} payload bytes",
        path.display(),
        summary.input_bytes,
        summary.symbols,
        summary.payload_bytes
    );
    Ok(dest)
}

/// Decompresses a `.hcmp` file into `output`, or into
/// `<name>(unzp).<original extension>` next to it.
pub fn decompress_file(path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    if Mode::detect(path) != Mode::Decompress {
        return Err(Error::format_mismatch(
            path,
            format!("not a .{COMPRESSED_EXTENSION} file"),
        ));
    }
    let mut input = BufReader::new(File::open(path)?);
    let header = Header::read_from(&mut input)?;
    let dest = match output {
        Some(output) => output.to_path_buf(),
        None => decompressed_path(path, &header.extension)?,
    };
    debug!("decompressing {} into {}", path.display(), dest.display());

    let written = write_atomically(&dest, |out| decode_payload(&header, input, out))?;
    info!("{}: restored {written} bytes", path.display());
    Ok(dest)
}

/// Compresses or decompresses `path` depending on its extension.
pub fn process_file(path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    match Mode::detect(path) {
        Mode::Compress => compress_file(path, output),
        Mode::Decompress => decompress_file(path, output),
    }
}
