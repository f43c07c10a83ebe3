//! HTTP fetching with decompression, verification and atomic install
//!
//! Every request carries a timeout: the short HTTP timeout for manifests and
//! version documents, the longer download timeout for file bodies. File
//! bodies are streamed through the decoder and hasher into a temporary file
//! in the target directory, which is renamed into place only once its SHA-1
//! matches.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use flate2::write::GzDecoder;
use futures::StreamExt;
use mirrorsync_core::types::NetworkConfig;
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::FetchError;

/// Read buffer for hashing files (1MB)
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Shared HTTP client plus the per-request timeouts
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    http_timeout: Duration,
    download_timeout: Duration,
}

impl Fetcher {
    /// Create a fetcher from network settings
    pub fn new(network: &NetworkConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&network.user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            http_timeout: Duration::from_secs(network.http_timeout_secs),
            download_timeout: Duration::from_secs(network.download_timeout_secs),
        })
    }

    /// Override both request timeouts
    pub fn with_timeouts(mut self, http: Duration, download: Duration) -> Self {
        self.http_timeout = http;
        self.download_timeout = download;
        self
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    /// GET a small document, returning the body and the latency to headers
    pub async fn get_document(&self, url: &str) -> Result<(Vec<u8>, Duration), FetchError> {
        self.get(url, self.http_timeout).await
    }

    /// GET and decode a JSON document
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let (body, _) = self.get_document(url).await?;
        serde_json::from_slice(&body).map_err(|source| FetchError::Json {
            url: url.to_string(),
            source,
        })
    }

    /// Stream a file body to `destination`, verifying it on the way
    ///
    /// Chunks are gunzipped when the URL ends in `.gz` and hashed as they
    /// are written to a temporary file beside `destination`. The temporary
    /// file is renamed over `destination` only when the SHA-1 matches
    /// `expected_sha1` (if given); otherwise it is dropped and nothing is
    /// left behind. Returns the number of bytes installed.
    pub async fn download_to(
        &self,
        url: &str,
        expected_sha1: Option<&str>,
        destination: &Path,
    ) -> Result<u64, FetchError> {
        let (response, latency) = self.send(url, self.download_timeout).await?;

        let write_err = |source| FetchError::Write {
            path: destination.to_path_buf(),
            source,
        };
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(write_err)?;
        let temp = NamedTempFile::new_in(parent).map_err(write_err)?;

        let mut sink = if url.ends_with(".gz") {
            BodySink::Gzip(GzDecoder::new(HashingWriter::new(temp)))
        } else {
            BodySink::Plain(HashingWriter::new(temp))
        };

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;
            sink.write_all(&chunk)
                .map_err(|e| sink_error(url, destination, e))?;
        }

        let HashingWriter {
            file,
            hasher,
            written,
        } = sink.finish().map_err(|e| sink_error(url, destination, e))?;
        debug!(
            url,
            bytes = written,
            latency_ms = latency.as_millis() as u64,
            "Downloaded"
        );

        let actual = format!("{:x}", hasher.finalize());
        if let Some(expected) = expected_sha1 {
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(FetchError::Verification {
                    url: url.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        file.as_file().sync_all().map_err(write_err)?;
        file.persist(destination).map_err(|e| write_err(e.error))?;
        Ok(written)
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<(Vec<u8>, Duration), FetchError> {
        let (response, latency) = self.send(url, timeout).await?;

        let body = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok((body.to_vec(), latency))
    }

    async fn send(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(reqwest::Response, Duration), FetchError> {
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let latency = started.elapsed();

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok((response, latency))
    }
}

/// Temporary file that hashes everything written to it
struct HashingWriter {
    file: NamedTempFile,
    hasher: Sha1,
    written: u64,
}

impl HashingWriter {
    fn new(file: NamedTempFile) -> Self {
        Self {
            file,
            hasher: Sha1::new(),
            written: 0,
        }
    }
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

enum BodySink {
    Plain(HashingWriter),
    Gzip(GzDecoder<HashingWriter>),
}

impl BodySink {
    fn write_all(&mut self, chunk: &[u8]) -> io::Result<()> {
        match self {
            BodySink::Plain(w) => w.write_all(chunk),
            BodySink::Gzip(w) => w.write_all(chunk),
        }
    }

    fn finish(self) -> io::Result<HashingWriter> {
        match self {
            BodySink::Plain(mut w) => {
                w.flush()?;
                Ok(w)
            }
            BodySink::Gzip(w) => {
                let mut inner = w.finish()?;
                inner.flush()?;
                Ok(inner)
            }
        }
    }
}

/// Corrupt gzip data surfaces as `InvalidInput`/`InvalidData`; anything
/// else came from the file
fn sink_error(url: &str, destination: &Path, source: io::Error) -> FetchError {
    match source.kind() {
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => FetchError::Decompress {
            url: url.to_string(),
            source,
        },
        _ => FetchError::Write {
            path: destination.to_path_buf(),
            source,
        },
    }
}

/// Lowercase hex SHA-1 of a byte slice
pub fn sha1_hex(data: &[u8]) -> String {
    format!("{:x}", Sha1::digest(data))
}

/// Lowercase hex SHA-1 of a file's content
pub fn sha1_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
