use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

use eyre::Result;

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write contents to a file on the disc
///
/// ```no_run
/// use slotlens_common::utils::io::file::write_file;
///
/// let path = "/tmp/test.txt";
/// let contents = "Hello, World!";
/// let result = write_file(path, contents);
/// ```
pub fn write_file(path_str: &str, contents: &str) -> Result<()> {
    write_bytes(path_str, contents.as_bytes())
}

/// Write raw bytes to a file on the disc, creating parent directories as needed
///
/// ```no_run
/// use slotlens_common::utils::io::file::write_bytes;
///
/// let result = write_bytes("/tmp/storage.bin", &[0u8; 64]);
/// ```
pub fn write_bytes(path_str: &str, contents: &[u8]) -> Result<()> {
    let path = Path::new(path_str);
    create_parent_dir(path)?;

    let mut file = File::create(path)?;
    file.write_all(contents)?;

    Ok(())
}

/// Read contents from a file on the disc
///
/// ```no_run
/// use slotlens_common::utils::io::file::read_file;
///
/// let path = "/tmp/test.txt";
/// let contents = read_file(path);
/// ```
pub fn read_file(path: &str) -> Result<String> {
    let path = Path::new(path);
    let mut file = File::open(path)?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// The path that stands for standard input.
pub const STDIN_PATH: &str = "-";

/// Read contents from a file on the disc, or from standard input when `path` is `-`
///
/// ```no_run
/// use slotlens_common::utils::io::file::read_input;
///
/// let contents = read_input("-");
/// ```
pub fn read_input(path: &str) -> Result<String> {
    read_file_or(path, std::io::stdin())
}

/// Read contents from a file on the disc, or from `reader` when `path` is `-`
pub fn read_file_or(path: &str, mut reader: impl Read) -> Result<String> {
    if path != STDIN_PATH {
        return read_file(path);
    }
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Read raw bytes from a file on the disc
///
/// ```no_run
/// use slotlens_common::utils::io::file::read_bytes;
///
/// let dump = read_bytes("/tmp/storage.bin");
/// ```
pub fn read_bytes(path: &str) -> Result<Vec<u8>> {
    Ok(std::fs::read(Path::new(path))?)
}

/// Delete a file or directory from the disc. Missing paths count as deleted.
pub fn delete_path(path: &str) -> bool {
    let path = Path::new(path);
    if !path.exists() {
        return true;
    }

    if path.is_dir() {
        std::fs::remove_dir_all(path).is_ok()
    } else {
        std::fs::remove_file(path).is_ok()
    }
}
