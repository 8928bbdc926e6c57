//! MD5 checksums used to detect drift between a script and what was applied.

use md5::{Digest, Md5};

/// Checksum of script content with CRLF line endings normalized to LF, so
/// the same script yields the same checksum on every platform.
pub fn compute_checksum(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    compute_raw_checksum(normalized.as_bytes())
}

/// Checksum of the exact bytes, as produced before line-ending normalization
/// existed. Only used as a fallback when validating older history rows.
pub fn compute_raw_checksum(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
