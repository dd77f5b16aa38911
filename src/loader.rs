//! Fetching and decoding of external documents.
//!
//! A locator without a URL scheme is a filesystem path (joined onto the
//! configured base directory); `http`/`https` locators are fetched with a
//! plain GET. The decoder is picked from the file extension and the result is
//! always normalized before it is handed back.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::LoadError;
use crate::value::{Normalize, Value};

/// Source of external documents for the resolver.
///
/// Implementations must return normalized trees.
pub trait Loader {
    fn load(&self, locator: &str, base_dir: Option<&Path>) -> Result<Value, LoadError>;
}

impl<L: Loader + ?Sized> Loader for &L {
    fn load(&self, locator: &str, base_dir: Option<&Path>) -> Result<Value, LoadError> {
        (**self).load(locator, base_dir)
    }
}

/// Serialization format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.yaml`/`.yml` (any case) is YAML; everything else is JSON.
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("yaml" | "yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

/// Decode raw bytes in the given format into a normalized tree.
pub fn decode(locator: &str, format: DocumentFormat, bytes: &[u8]) -> Result<Value, LoadError> {
    let decode_error = |message: String| LoadError::Decode {
        locator: locator.to_string(),
        message,
    };
    match format {
        DocumentFormat::Yaml => {
            let mut raw: serde_yaml::Value =
                serde_yaml::from_slice(bytes).map_err(|e| decode_error(e.to_string()))?;
            // `<<: *anchor` merge keys are expanded before normalization.
            raw.apply_merge()
                .map_err(|e| decode_error(format!("merging keys: {e}")))?;
            Ok(raw.normalize())
        }
        DocumentFormat::Json => {
            serde_json::from_slice::<Value>(bytes).map_err(|e| decode_error(e.to_string()))
        }
    }
}

/// Read and decode a top-level document from disk.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let locator = path.to_string_lossy();
    decode(&locator, DocumentFormat::from_path(&locator), &bytes)
}

/// The production loader: local files and HTTP(S).
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self {
        DocumentLoader
    }

    fn load_local(&self, locator: &str, base_dir: Option<&Path>) -> Result<Value, LoadError> {
        let raw_path = locator.split('?').next().unwrap_or(locator);
        let decoded = urlencoding::decode(raw_path)
            .map(|p| p.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());
        let path = local_path(&decoded, base_dir);

        tracing::info!("loading local file {}", path.display());
        let bytes = std::fs::read(&path).map_err(|e| LoadError::Read {
            path: path.clone(),
            source: e,
        })?;
        decode(locator, DocumentFormat::from_path(&decoded), &bytes)
    }

    fn load_remote(&self, url: &Url) -> Result<Value, LoadError> {
        tracing::info!("Fetching {url}");
        let body = fetch_remote(url)?;
        decode(url.as_str(), DocumentFormat::from_path(url.path()), &body)
    }
}

impl Loader for DocumentLoader {
    fn load(&self, locator: &str, base_dir: Option<&Path>) -> Result<Value, LoadError> {
        match Url::parse(locator) {
            Err(url::ParseError::RelativeUrlWithoutBase) => self.load_local(locator, base_dir),
            Err(e) => Err(LoadError::Locator {
                locator: locator.to_string(),
                source: e,
            }),
            Ok(url) => match url.scheme() {
                "http" | "https" => self.load_remote(&url),
                scheme => Err(LoadError::UnsupportedScheme {
                    locator: locator.to_string(),
                    scheme: scheme.to_string(),
                }),
            },
        }
    }
}

/// Join a scheme-less locator onto the base directory, if one is configured.
///
/// The locator is always placed under the base directory, even when it is
/// written as an absolute path.
pub fn local_path(path: &str, base_dir: Option<&Path>) -> PathBuf {
    match base_dir {
        Some(dir) => {
            let relative = Path::new(path)
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)));
            let mut joined = dir.to_path_buf();
            joined.extend(relative);
            joined
        }
        None => PathBuf::from(path),
    }
}

/// GET `url` and return the body. Blocks on a single-threaded runtime.
#[cfg(feature = "download")]
fn fetch_remote(url: &Url) -> Result<Vec<u8>, LoadError> {
    let transport_error = |message: String| LoadError::Transport {
        url: url.to_string(),
        message,
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| transport_error(format!("starting runtime: {e}")))?;

    rt.block_on(async {
        let response = reqwest::get(url.clone())
            .await
            .map_err(|e| transport_error(format!("GET {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(format!("reading response body: {e}")))?;
        Ok(body.to_vec())
    })
}

#[cfg(not(feature = "download"))]
fn fetch_remote(url: &Url) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::RemoteDisabled {
        url: url.to_string(),
    })
}
