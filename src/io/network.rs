//! HTTP range-request blob
//!
//! Lets a [`TabixIndex`](crate::TabixIndex) load a remote `.tbi` without
//! downloading anything but the index itself:
//! - HTTP/HTTPS range requests (`206 Partial Content` required)
//! - Small LRU cache of fetched ranges
//! - Automatic retry with exponential backoff
//! - Timeout handling
//!
//! # Example
//!
//! ```no_run
//! use biometal_tabix::io::network::HttpBlob;
//! use biometal_tabix::TabixIndex;
//!
//! # fn main() -> biometal_tabix::Result<()> {
//! let blob = HttpBlob::new("https://example.com/variants.vcf.gz.tbi")?;
//! let index = TabixIndex::new(blob);
//! index.load()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TabixError};
use crate::io::blob::Blob;
use bytes::Bytes;
use lru::LruCache;
use reqwest::blocking::Client;
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Default HTTP timeout (2 minutes)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default number of attempts per range
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default number of cached ranges
pub const DEFAULT_CACHE_ENTRIES: usize = 64;

type CacheKey = (u64, usize);

/// Blob served by HTTP range requests
pub struct HttpBlob {
    url: String,
    client: Client,
    timeout: Duration,
    max_retries: u32,
    cache: Mutex<LruCache<CacheKey, Bytes>>,
    content_length: OnceLock<Option<u64>>,
}

impl std::fmt::Debug for HttpBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBlob")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl HttpBlob {
    /// Create a blob for `url` with default settings
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(HttpBlob {
            url: url.into(),
            client: build_client(DEFAULT_TIMEOUT)?,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            cache: Mutex::new(LruCache::new(cache_capacity(DEFAULT_CACHE_ENTRIES))),
            content_length: OnceLock::new(),
        })
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = build_client(timeout)?;
        self.timeout = timeout;
        Ok(self)
    }

    /// Set the number of attempts per range (minimum 1)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set how many fetched ranges are kept
    pub fn with_cache_entries(mut self, entries: usize) -> Self {
        self.cache = Mutex::new(LruCache::new(cache_capacity(entries)));
        self
    }

    /// URL being read
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch with automatic retry and exponential backoff
    fn fetch_with_retry(&self, start: u64, length: usize) -> Result<Bytes> {
        let mut attempts = 0;
        let mut backoff = Duration::from_millis(100);

        loop {
            match self.fetch_range_once(start, length) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    attempts += 1;
                    if attempts >= self.max_retries {
                        return Err(e);
                    }
                    tracing::debug!(url = %self.url, start, attempts, error = %e, "retrying range request");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
            }
        }
    }

    /// Single fetch attempt (no retry)
    fn fetch_range_once(&self, start: u64, length: usize) -> Result<Bytes> {
        let end = start + length as u64;
        let response = self
            .client
            .get(&self.url)
            .header("Range", format!("bytes={}-{}", start, end - 1))
            .send()
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        match status.as_u16() {
            206 => {}
            // Range starts past the end of the file
            416 => return Ok(Bytes::new()),
            200 => {
                return Err(TabixError::Network(format!(
                    "Server does not support range requests (returned 200 instead of 206): {}",
                    self.url
                )))
            }
            _ if !status.is_success() => {
                return Err(TabixError::Http {
                    status: status.as_u16(),
                    url: self.url.clone(),
                })
            }
            _ => {}
        }

        let bytes = response
            .bytes()
            .map_err(|e| TabixError::Network(e.to_string()))?;

        if bytes.len() > length {
            return Err(TabixError::Network(format!(
                "Server returned more data than requested: expected {} bytes, got {} bytes",
                length,
                bytes.len()
            )));
        }

        Ok(bytes)
    }

    fn fetch_content_length(&self) -> Result<Option<u64>> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            return Err(TabixError::Http {
                status: response.status().as_u16(),
                url: self.url.clone(),
            });
        }
        // `content_length()` is the body size hint, which is zero for HEAD
        Ok(response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok()))
    }

    fn map_request_error(&self, e: reqwest::Error) -> TabixError {
        if e.is_timeout() {
            TabixError::Timeout {
                seconds: self.timeout.as_secs(),
                url: self.url.clone(),
            }
        } else {
            TabixError::Network(e.to_string())
        }
    }
}

impl Blob for HttpBlob {
    fn read(&self, offset: u64, length: usize) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }

        let key = (offset, length);
        if let Some(data) = self.lock_cache().get(&key) {
            return Ok(data.clone());
        }

        let data = self.fetch_with_retry(offset, length)?;
        self.lock_cache().put(key, data.clone());
        Ok(data)
    }

    fn size(&self) -> Result<Option<u64>> {
        if let Some(len) = self.content_length.get() {
            return Ok(*len);
        }
        let len = self.fetch_content_length()?;
        Ok(*self.content_length.get_or_init(|| len))
    }
}

impl HttpBlob {
    fn lock_cache(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, Bytes>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TabixError::Network(e.to_string()))
}

fn cache_capacity(entries: usize) -> NonZeroUsize {
    NonZeroUsize::new(entries).unwrap_or(NonZeroUsize::MIN)
}
