//! Error types for the openapi2proto crate.

use std::fmt;
use std::path::PathBuf;

/// Errors raised while fetching and decoding an external document.
///
/// Every variant carries the locator (or URL) that failed so that the
/// message is useful without the surrounding resolution path.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// A local file could not be read.
    #[error("failed to read local file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The locator is not a usable URL.
    #[error("failed to parse locator {locator}: {source}")]
    Locator {
        locator: String,
        source: url::ParseError,
    },

    /// The locator names a scheme other than `http`, `https` or a plain path.
    #[error("cannot handle reference {locator} (unsupported scheme '{scheme}')")]
    UnsupportedScheme { locator: String, scheme: String },

    /// The remote server answered with a non-2xx status.
    #[error("failed to fetch remote file {url}: status {status}")]
    Status { url: String, status: u16 },

    /// The HTTP request or reading its body failed.
    #[error("failed to fetch remote file {url}: {message}")]
    Transport { url: String, message: String },

    /// HTTP fetching was compiled out.
    #[error("cannot fetch remote file {url}: built without the `download` feature")]
    RemoteDisabled { url: String },

    /// The fetched bytes are not valid JSON/YAML.
    #[error("failed to decode {locator}: {message}")]
    Decode { locator: String, message: String },
}

/// Why a JSON Pointer failed to reach a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointerError {
    #[error("pointer must be empty or start with '/'")]
    MissingLeadingSlash,

    #[error("no such key '{segment}'")]
    NoSuchKey { segment: String },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("'{segment}' is not a valid array index")]
    InvalidIndex { segment: String },

    #[error("cannot descend into a scalar with '{segment}'")]
    NotAContainer { segment: String },
}

/// One step of the path at which a resolution error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "map element for {key}"),
            PathSegment::Index(index) => write!(f, "element {index}"),
        }
    }
}

/// Errors raised by the reference resolver.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The `$ref` value is not valid URL syntax.
    #[error("failed to parse reference {reference}: {source}")]
    Url {
        reference: String,
        source: url::ParseError,
    },

    /// A `$ref` key holds something other than a string.
    #[error("'$ref' key contains non-string element ({found})")]
    InvalidRef { found: &'static str },

    /// The external document could not be loaded.
    #[error("failed to resolve external reference {reference}")]
    Load {
        reference: String,
        source: LoadError,
    },

    /// The fragment does not address a node of the loaded document.
    #[error("failed to resolve document fragment '{fragment}' in {locator}")]
    PointerMiss {
        locator: String,
        fragment: String,
        source: PointerError,
    },

    /// Expanding the reference re-entered a reference that is still being expanded.
    #[error("reference cycle detected at {reference}")]
    Cycle { reference: String },

    /// A nested failure, tagged with the key or index where it happened.
    #[error("failed to resolve {segment}")]
    At {
        segment: PathSegment,
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Wrap `self` with the path segment at which it was encountered.
    pub fn at(self, segment: PathSegment) -> Self {
        ResolveError::At {
            segment,
            source: Box::new(self),
        }
    }

    /// The location of the failure as a JSON Pointer (`""` for the root).
    pub fn path(&self) -> String {
        let mut out = String::new();
        let mut current = self;
        while let ResolveError::At { segment, source } = current {
            out.push('/');
            match segment {
                PathSegment::Key(key) => out.push_str(&key.replace('~', "~0").replace('/', "~1")),
                PathSegment::Index(index) => out.push_str(&index.to_string()),
            }
            current = source.as_ref();
        }
        out
    }

    /// The innermost error, with every path wrapper removed.
    pub fn root_cause(&self) -> &ResolveError {
        let mut current = self;
        while let ResolveError::At { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

/// Errors raised by the protobuf type graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("reference '{name}' has not been bound")]
    Unbound { name: String },

    #[error("reference '{name}' is already bound")]
    AlreadyBound { name: String },

    #[error("type '{name}' is not defined")]
    Unknown { name: String },

    #[error("unresolved type references: {}", .names.join(", "))]
    Unresolved { names: Vec<String> },

    #[error("registry backing reference '{name}' has been dropped")]
    RegistryDropped { name: String },

    #[error("reference '{name}' resolves back to itself")]
    ReferenceLoop { name: String },
}

/// Top-level errors surfaced by the library and the binary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to resolve object")]
    Resolve(#[from] ResolveError),

    #[error("failed to load document")]
    Load(#[from] LoadError),

    #[error("type graph error")]
    Type(#[from] TypeError),

    /// Failed to write output.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize the resolved document.
    #[error("failed to serialize output: {0}")]
    Output(String),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
