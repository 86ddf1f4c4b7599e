/*
 * Classifies files as binary or text by sniffing their leading bytes. Binary
 * files are mirrored verbatim; only text is sent for translation.
 */
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const SNIFF_LEN: usize = 4096;

/*
 * Returns true when the first 4 KiB look binary: any NUL byte, or (for bytes that
 * are not valid UTF-8) more than 10% control characters other than common
 * whitespace, form feed and escape. Empty files are text.
 */
pub fn is_binary_file(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    file.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut buffer)?;
    Ok(looks_binary(&buffer))
}

pub fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    if bytes.contains(&0) {
        return true;
    }
    if valid_utf8_prefix(bytes) {
        return false;
    }
    let control_bytes = bytes
        .iter()
        .filter(|&&b| b.is_ascii_control() && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b))
        .count();
    control_bytes * 10 > bytes.len()
}

// A sniff window may cut a multi-byte character in half; that alone is not binary.
fn valid_utf8_prefix(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && bytes.len() == SNIFF_LEN,
    }
}
