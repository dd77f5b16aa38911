//! Classification and parsing of `$ref` strings.

use url::Url;

use crate::error::ResolveError;

/// The mapping key that marks a node as a JSON Reference.
pub const REF_KEY: &str = "$ref";

/// References under this prefix name protobuf well-known types and are
/// never fetched.
pub const VENDORED_PREFIX: &str = "google/protobuf/";

/// A parsed `$ref`: the document locator and the JSON Pointer fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    /// URL or path with the fragment removed.
    pub locator: String,
    /// Percent-decoded fragment, possibly empty.
    pub fragment: String,
}

impl Ref {
    /// Re-join locator and fragment.
    pub fn to_url_string(&self) -> String {
        if self.fragment.is_empty() {
            self.locator.clone()
        } else {
            format!("{}#{}", self.locator, self.fragment)
        }
    }
}

/// Split a reference into locator and fragment.
///
/// Absolute URLs go through [`Url`] (and come back in its normalized form);
/// relative references are validated against a placeholder base and keep
/// their original spelling as the locator.
pub fn parse_ref(s: &str) -> Result<Ref, ResolveError> {
    let url_error = |source| ResolveError::Url {
        reference: s.to_string(),
        source,
    };

    match Url::parse(s) {
        Ok(mut url) => {
            let fragment = url.fragment().map(decode_fragment).unwrap_or_default();
            url.set_fragment(None);
            Ok(Ref {
                locator: url.to_string(),
                fragment,
            })
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("file:///").map_err(url_error)?;
            base.join(s).map_err(url_error)?;
            let (locator, fragment) = match s.split_once('#') {
                Some((locator, fragment)) => (locator, decode_fragment(fragment)),
                None => (s, String::new()),
            };
            Ok(Ref {
                locator: locator.to_string(),
                fragment,
            })
        }
        Err(e) => Err(url_error(e)),
    }
}

/// Whether a reference names another document that must be fetched.
///
/// In-document pointers (`#/...`) and vendored well-known types are left for
/// later stages; everything else is external.
pub fn is_external(s: &str) -> bool {
    if s.starts_with(VENDORED_PREFIX) {
        return false;
    }
    !s.starts_with('#')
}

fn decode_fragment(fragment: &str) -> String {
    urlencoding::decode(fragment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| fragment.to_string())
}
