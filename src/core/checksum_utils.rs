/*
 * Provides utility functions for calculating checksums of files. The file pipeline
 * uses them to decide whether a copy-only destination already holds the same bytes
 * as its source, so unchanged files are neither rewritten nor touched.
 */
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

/*
 * Calculates the SHA256 checksum of a file and returns it as a hex-encoded string.
 *
 * Reads the file in chunks to handle potentially large files efficiently. If any
 * I/O error occurs during file reading or if the path does not point to a file,
 * an `io::Error` is returned.
 */
pub fn calculate_sha256_checksum(file_path: &Path) -> io::Result<String> {
    log::trace!("ChecksumUtils: Calculating SHA256 checksum for: {file_path:?}");
    if !file_path.is_file() {
        let err_msg = format!("Path {file_path:?} is not a file, cannot calculate checksum.");
        log::warn!("ChecksumUtils: {err_msg}");
        return Err(io::Error::new(io::ErrorKind::InvalidInput, err_msg));
    }

    let file = File::open(file_path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0; 1024 * 4]; // 4KB buffer

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let hex_checksum = format!("{:x}", hasher.finalize());
    log::trace!("ChecksumUtils: Calculated checksum {hex_checksum} for {file_path:?}");
    Ok(hex_checksum)
}

/*
 * Returns true when `destination` exists and holds exactly the bytes of `source`.
 * Sizes are compared first so differing files are usually rejected without hashing.
 * A missing destination is simply "not identical"; other I/O errors propagate.
 */
pub fn files_identical(source: &Path, destination: &Path) -> io::Result<bool> {
    let destination_meta = match fs::metadata(destination) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if !destination_meta.is_file() {
        return Ok(false);
    }
    if fs::metadata(source)?.len() != destination_meta.len() {
        return Ok(false);
    }
    Ok(calculate_sha256_checksum(source)? == calculate_sha256_checksum(destination)?)
}
