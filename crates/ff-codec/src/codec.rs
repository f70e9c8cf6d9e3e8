//! The size-limit wire codec: `deliver` shrinks an oversized UTF-8 payload
//! (zlib-deflate + base64, falling back to a blob-store URL); `receive`
//! reverses either form. Payloads under the limit pass through untouched.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::blob_store::{BlobStore, BlobStoreError};

/// The orchestrator's per-payload size ceiling. The source oscillated
/// between 32000 and the SWF-documented 32768; this port fixes 32000.
pub const DEFAULT_SIZE_LIMIT: usize = 32_000;

const MAGICK_ZIP: &str = "FF-ZIP";
const MAGICK_URL: &str = "FF-URL";
const SEPARATOR: char = ':';
const RETENTION_PREFIX: &str = "retain_30_180/zipped-ff";

/// Failures encoding or decoding a wire payload.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("malformed {0} header: {1}")]
    MalformedHeader(&'static str, String),
    #[error("decoded payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    BlobStore(#[from] BlobStoreError),
    #[error("only the s3 scheme is supported for blob-stored payloads, got '{0}'")]
    UnsupportedScheme(String),
}

/// Shrink `data` to fit under `limit`, falling back to `store` when even the
/// zipped form doesn't fit. Payloads already under the limit pass through.
pub async fn deliver(
    data: &str,
    limit: usize,
    bucket: &str,
    store: &dyn BlobStore,
) -> Result<String, CodecError> {
    if data.len() < limit {
        return Ok(data.to_string());
    }

    let zipped = zip_data(data)?;
    if zipped.len() > limit {
        store_in_blob(&zipped, bucket, store).await
    } else {
        Ok(zipped)
    }
}

fn zip_data(data: &str) -> Result<String, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data.as_bytes()).map_err(CodecError::Compress)?;
    let compressed = encoder.finish().map_err(CodecError::Compress)?;
    let encoded = STANDARD.encode(compressed);
    Ok(format!("{MAGICK_ZIP}{SEPARATOR}{}{SEPARATOR}{}", data.len(), encoded))
}

async fn store_in_blob(zipped: &str, bucket: &str, store: &dyn BlobStore) -> Result<String, CodecError> {
    let digest = md5::compute(zipped.as_bytes());
    let hash = format!("{digest:x}");
    let key = format!("{RETENTION_PREFIX}/{hash}.ff");
    store.put(bucket, &key, zipped.as_bytes()).await?;
    Ok(format!("{MAGICK_URL}{SEPARATOR}{hash}{SEPARATOR}s3://{bucket}/{key}"))
}

/// Reverse `deliver`, resolving any blob-store indirection along the way.
pub async fn receive(data: &str, store: &dyn BlobStore) -> Result<String, CodecError> {
    let mut current = data.to_string();
    loop {
        if current.starts_with(MAGICK_URL) {
            current = receive_url(&current, store).await?;
        } else if current.starts_with(MAGICK_ZIP) {
            return receive_zipped(&current);
        } else {
            return Ok(current);
        }
    }
}

fn receive_zipped(zipped: &str) -> Result<String, CodecError> {
    let mut parts = zipped.splitn(3, SEPARATOR);
    let _magick = parts.next();
    let _length = parts
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-ZIP", zipped.to_string()))?;
    let body = parts
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-ZIP", zipped.to_string()))?;

    let decoded = base64_decode_tolerant(body)?;
    let mut decoder = ZlibDecoder::new(decoded.as_slice());
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CodecError::Decompress)?;
    Ok(String::from_utf8(out)?)
}

async fn receive_url(ff_url: &str, store: &dyn BlobStore) -> Result<String, CodecError> {
    let mut parts = ff_url.splitn(3, SEPARATOR);
    let _magick = parts.next();
    let _hash = parts
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-URL", ff_url.to_string()))?;
    let url = parts
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-URL", ff_url.to_string()))?;

    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| CodecError::UnsupportedScheme(url.split("://").next().unwrap_or(url).to_string()))?;
    let mut segments = rest.splitn(2, '/');
    let bucket = segments
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-URL", ff_url.to_string()))?;
    let key = segments
        .next()
        .ok_or_else(|| CodecError::MalformedHeader("FF-URL", ff_url.to_string()))?;

    let bytes = store.get(bucket, key).await?;
    Ok(String::from_utf8(bytes)?)
}

/// Decode base64 that may carry embedded newlines (the historical streaming
/// flavor) as well as the newline-free in-memory flavor this port emits.
fn base64_decode_tolerant(body: &str) -> Result<Vec<u8>, CodecError> {
    let stripped: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(stripped)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::BlobStore;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemBlobStore {
        objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    }

    #[async_trait::async_trait]
    impl BlobStore for MemBlobStore {
        async fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<(), BlobStoreError> {
            self.objects.lock().unwrap().insert((bucket.to_string(), key.to_string()), bytes.to_vec());
            Ok(())
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BlobStoreError> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| BlobStoreError::Get(format!("no such object {bucket}/{key}")))
        }
    }

    #[test]
    fn size_limit_is_32000_not_32768() {
        assert_eq!(DEFAULT_SIZE_LIMIT, 32_000);
    }

    #[tokio::test]
    async fn small_payload_passes_through_unchanged() {
        let store = MemBlobStore::default();
        let out = deliver("hello", 100, "bucket", &store).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn zipped_form_round_trips() {
        let store = MemBlobStore::default();
        let payload = "x".repeat(72_686);
        let delivered = deliver(&payload, 30_000, "bucket", &store).await.unwrap();
        assert!(delivered.starts_with("FF-ZIP:72686:"), "{delivered}");
        let received = receive(&delivered, &store).await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn blob_store_fallback_round_trips() {
        let store = MemBlobStore::default();
        // Highly compressible run, but far too large even zipped at this limit.
        let payload = (0..394_710).map(|i| (b'a' + (i % 7) as u8) as char).collect::<String>();
        let delivered = deliver(&payload, 30_000, "bucket", &store).await.unwrap();
        assert!(delivered.starts_with("FF-URL:"), "{delivered}");
        let hash_part = delivered.split(':').nth(1).unwrap();
        assert_eq!(hash_part.len(), 32);
        let received = receive(&delivered, &store).await.unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn tolerant_decode_accepts_embedded_newlines() {
        let store = MemBlobStore::default();
        let payload = "round trip me";
        let delivered = deliver(payload, 1, "bucket", &store).await.unwrap();
        let (header, body) = delivered.rsplit_once(':').unwrap();
        let wrapped_body = body
            .as_bytes()
            .chunks(8)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let newline_variant = format!("{header}:{wrapped_body}");
        let received = receive(&newline_variant, &store).await.unwrap();
        assert_eq!(received, payload);
    }
}
