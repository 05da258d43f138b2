use crate::{Error, Fingerprint, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const READ_CHUNK_SIZE: usize = 8192;

/// Streams `reader` through SHA-256 in bounded chunks.
///
/// Returns the fingerprint together with the number of bytes consumed.
pub async fn fingerprint_reader<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<(Fingerprint, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let read = reader.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }

    Ok((Fingerprint::new(hasher.finalize().into()), total))
}

pub async fn fingerprint_file(path: &Path) -> Result<(Fingerprint, u64)> {
    let mut file = fs::File::open(path).await.map_err(|e| Error::io_at(path, e))?;
    fingerprint_reader(&mut file).await.map_err(|e| Error::io_at(path, e))
}
