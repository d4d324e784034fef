//! Static asset responder.
//!
//! Resolves request paths against a document root and returns the file
//! bytes with a content type inferred from the extension. Lookups never
//! fail outright: a missing file becomes a 404 carrying the configured
//! not-found document, any other read failure becomes a 500.

use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Body used when the not-found document is itself missing.
pub const FALLBACK_NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";

const DEFAULT_CONTENT_TYPE: &str = "text/html";

/// Maps a file extension to a content type.
///
/// Only a handful of extensions are recognised; anything else, including a
/// missing extension, is served as `text/html`.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") => "image/jpg",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Result of a static lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Serves files from a fixed document root.
#[derive(Debug, Clone)]
pub struct StaticResponder {
    document_root: PathBuf,
    index_document: String,
    not_found_document: String,
}

impl StaticResponder {
    pub fn new(
        document_root: impl Into<PathBuf>,
        index_document: impl Into<String>,
        not_found_document: impl Into<String>,
    ) -> Self {
        Self {
            document_root: document_root.into(),
            index_document: index_document.into(),
            not_found_document: not_found_document.into(),
        }
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    /// Maps a request path to a file below the document root.
    ///
    /// The path is percent-decoded first. `/` resolves to the index
    /// document. Returns `None` for paths that are not UTF-8 once decoded,
    /// contain NUL, or would leave the root (`..`, absolute or prefixed
    /// components).
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        if decoded.contains('\0') {
            return None;
        }

        let relative = match decoded.trim_start_matches('/') {
            "" => self.index_document.as_str(),
            rest => rest,
        };

        let escapes = Path::new(relative)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }

        Some(self.document_root.join(relative))
    }

    /// Looks up `request_path` and builds the response.
    pub async fn serve(&self, request_path: &str) -> StaticResponse {
        let Some(path) = self.resolve(request_path) else {
            debug!("Rejected path outside document root: {}", request_path);
            return self.not_found().await;
        };

        match tokio::fs::read(&path).await {
            Ok(body) => StaticResponse {
                status: 200,
                content_type: content_type_for(&path),
                body,
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("404 for {}", request_path);
                self.not_found().await
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                internal_error(&e)
            }
        }
    }

    async fn not_found(&self) -> StaticResponse {
        let page = self.document_root.join(&self.not_found_document);
        let body = match tokio::fs::read(&page).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Not-found document {} unavailable: {}", page.display(), e);
                FALLBACK_NOT_FOUND_BODY.as_bytes().to_vec()
            }
        };

        StaticResponse {
            status: 404,
            content_type: DEFAULT_CONTENT_TYPE,
            body,
        }
    }
}

fn internal_error(error: &io::Error) -> StaticResponse {
    StaticResponse {
        status: 500,
        content_type: "text/plain",
        body: format!(
            "Sorry, check with the site admin for error: {:?} ..\n",
            error.kind()
        )
        .into_bytes(),
    }
}
