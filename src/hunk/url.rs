//! Remote hunks fetched over HTTP.
//!
//! The body is fetched at most once per hunk. When a cache is available the
//! body and its validators (`ETag`, `Last-Modified`) are stored there, and
//! later fetches send a conditional request; `304 Not Modified` reuses the
//! cached body.

use std::sync::{Arc, OnceLock};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, HeaderName, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};

use super::Bytes;
use crate::cache::{Cache, CacheKey};
use crate::error::{Error, Result};

/// Connection pool shared by every remote hunk of the process.
static CLIENT: OnceLock<Client> = OnceLock::new();

fn client() -> Result<&'static Client> {
    if let Some(client) = CLIENT.get() {
        return Ok(client);
    }
    let built = Client::builder().build().map_err(|e| Error::Http {
        url: String::new(),
        message: format!("cannot create HTTP client: {e}"),
    })?;
    Ok(CLIENT.get_or_init(|| built))
}

#[derive(Clone)]
pub struct UrlHunk {
    url: String,
    cache: Option<Arc<dyn Cache>>,
    data: Arc<OnceLock<Bytes>>,
}

/// Validators remembered alongside a cached body.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Validators {
    etag: Option<String>,
    last_modified: Option<String>,
}

impl UrlHunk {
    pub fn new(url: impl Into<String>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            url: url.into(),
            cache,
            data: Arc::new(OnceLock::new()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub(super) fn bytes(&self) -> Result<Bytes> {
        if let Some(data) = self.data.get() {
            return Ok(data.clone());
        }
        let data = self.fetch()?;
        Ok(self.data.get_or_init(|| data).clone())
    }

    /// Absolute URL to request; protocol-relative references use https.
    fn request_url(&self) -> String {
        if self.url.starts_with("//") {
            format!("https:{}", self.url)
        } else {
            self.url.clone()
        }
    }

    fn fetch(&self) -> Result<Bytes> {
        let body_key = CacheKey::simple("url", &self.url);
        let meta_key = CacheKey::simple("url-headers", &self.url);

        let cached_body = self.cache.as_ref().and_then(|c| c.get(&body_key));
        let validators: Validators = self
            .cache
            .as_ref()
            .and_then(|c| c.get(&meta_key))
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .unwrap_or_default();

        let mut request = client()?.get(self.request_url());
        if cached_body.is_some() {
            if let Some(etag) = &validators.etag {
                request = request.header(IF_NONE_MATCH, etag);
            }
            if let Some(modified) = &validators.last_modified {
                request = request.header(IF_MODIFIED_SINCE, modified);
            }
        }

        let response = request.send().map_err(|e| self.http_error(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED
            && let Some(body) = cached_body
        {
            crate::debug!("fetch"; "{} not modified, using cached body", self.url);
            return Ok(body.into());
        }
        if !status.is_success() {
            return Err(self.http_error(format!("HTTP {status}")));
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let fresh = Validators {
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        };

        let body = response
            .bytes()
            .map_err(|e| self.http_error(e.to_string()))?;
        crate::debug!("fetch"; "{} ({} bytes)", self.url, body.len());

        if let Some(cache) = &self.cache {
            cache.set(&body_key, &body);
            if let Ok(meta) = serde_json::to_vec(&fresh) {
                cache.set(&meta_key, &meta);
            }
        }

        Ok(Bytes::from(&body[..]))
    }

    fn http_error(&self, message: String) -> Error {
        Error::Http {
            url: self.url.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::error::ErrorKind;
    use crate::hunk::Hunk;
    use std::thread;
    use tiny_http::{Header, Response, Server, StatusCode as HttpStatus};

    /// Start a local server answering `requests` requests with `handler`.
    fn serve<F>(requests: usize, handler: F) -> (String, thread::JoinHandle<()>)
    where
        F: Fn(&tiny_http::Request) -> Response<std::io::Cursor<Vec<u8>>> + Send + 'static,
    {
        let server = Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let handle = thread::spawn(move || {
            for _ in 0..requests {
                let request = server.recv().unwrap();
                let response = handler(&request);
                request.respond(response).unwrap();
            }
        });
        (format!("http://127.0.0.1:{port}/lib.js"), handle)
    }

    fn if_none_match(request: &tiny_http::Request) -> Option<String> {
        request
            .headers()
            .iter()
            .find(|h| h.field.equiv("If-None-Match"))
            .map(|h| h.value.as_str().to_string())
    }

    #[test]
    fn test_client_is_shared() {
        let first = client().unwrap();
        let second = client().unwrap();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_fetch_once() {
        let (url, server) = serve(1, |_| Response::from_string("var x = 1;"));
        let hunk = Hunk::Url(UrlHunk::new(&url, None));

        assert_eq!(hunk.text().unwrap(), "var x = 1;");
        // memoized: the server only answers one request
        assert_eq!(hunk.text().unwrap(), "var x = 1;");
        server.join().unwrap();
    }

    #[test]
    fn test_non_success_status_is_error() {
        let (url, server) = serve(1, |_| {
            Response::from_string("missing").with_status_code(HttpStatus(404))
        });
        let err = Hunk::Url(UrlHunk::new(&url, None)).bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("404"));
        server.join().unwrap();
    }

    #[test]
    fn test_conditional_request_reuses_cached_body() {
        let (url, server) = serve(2, |request| match if_none_match(request) {
            Some(tag) if tag == "\"v1\"" => {
                Response::from_data(Vec::new()).with_status_code(HttpStatus(304))
            }
            _ => Response::from_string("body v1")
                .with_header(Header::from_bytes(&b"ETag"[..], &b"\"v1\""[..]).unwrap()),
        });
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(10));

        let first = Hunk::Url(UrlHunk::new(&url, Some(cache.clone())));
        assert_eq!(first.text().unwrap(), "body v1");

        let second = Hunk::Url(UrlHunk::new(&url, Some(cache)));
        assert_eq!(second.text().unwrap(), "body v1");
        server.join().unwrap();
    }
}
