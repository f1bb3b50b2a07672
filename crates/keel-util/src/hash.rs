use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256, Sha512};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 hash of a byte slice, returning a lowercase hex string.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-512 hash of a byte slice, returning a lowercase hex string.
pub fn sha512_bytes(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-512 hash of a byte slice, returning the base64 form used
/// by lock snapshots and detached hash markers.
pub fn sha512_base64(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    BASE64.encode(hasher.finalize())
}

/// Compute the base64 SHA-512 hash of a file, streaming its contents.
pub fn sha512_base64_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(BASE64.encode(hasher.finalize()))
}
