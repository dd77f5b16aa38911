//! External `$ref` resolution.
//!
//! [`Resolver::resolve`] walks a normalized tree and replaces every mapping
//! whose `$ref` names another document with the node the reference points
//! at, resolving that node in turn. In-document (`#/...`) and vendored
//! (`google/protobuf/...`) references are left exactly as they are; the
//! translation layer owns those.
//!
//! Each top-level call owns a fresh [`ResolutionCache`], so a locator is
//! fetched at most once per call no matter how many references share it.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use serde_json::Map;

use crate::error::{PathSegment, ResolveError};
use crate::loader::{DocumentLoader, Loader};
use crate::pointer;
use crate::reference::{REF_KEY, Ref, is_external, parse_ref};
use crate::value::{Normalize, Value, kind};

/// Options recognized by [`Resolver::resolve`].
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    dir: Option<PathBuf>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory for relative filesystem locators.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

/// Loaded documents keyed by locator, scoped to one resolution.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    documents: HashMap<String, Value>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, locator: &str) -> Option<&Value> {
        self.documents.get(locator)
    }

    pub fn contains(&self, locator: &str) -> bool {
        self.documents.contains_key(locator)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    // Stores the loaded document before handing it out; later lookups for the
    // same locator never reach `load`.
    fn get_or_load<E>(
        &mut self,
        locator: &str,
        load: impl FnOnce() -> Result<Value, E>,
    ) -> Result<&Value, E> {
        match self.documents.entry(locator.to_string()) {
            Entry::Occupied(entry) => {
                tracing::debug!("reusing cached document {locator}");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => Ok(entry.insert(load()?)),
        }
    }
}

/// Resolves external references using a [`Loader`].
#[derive(Debug, Default)]
pub struct Resolver<L = DocumentLoader> {
    loader: L,
}

impl Resolver<DocumentLoader> {
    pub fn new() -> Self {
        Resolver {
            loader: DocumentLoader::new(),
        }
    }
}

impl<L: Loader> Resolver<L> {
    pub fn with_loader(loader: L) -> Self {
        Resolver { loader }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Normalize `document` and resolve every external reference in it.
    ///
    /// All-or-nothing: the first failure aborts the call and is returned
    /// wrapped with the path at which it happened.
    pub fn resolve<D: Normalize>(
        &self,
        document: D,
        options: &ResolveOptions,
    ) -> Result<Value, ResolveError> {
        let mut cache = ResolutionCache::new();
        self.resolve_with_cache(document.normalize(), &mut cache, options.dir())
    }

    /// Resolve an already-normalized tree against a caller-owned cache.
    pub fn resolve_with_cache(
        &self,
        tree: Value,
        cache: &mut ResolutionCache,
        base_dir: Option<&Path>,
    ) -> Result<Value, ResolveError> {
        let mut ctx = ResolveCtx {
            loader: &self.loader,
            base_dir,
            cache,
            active: Vec::new(),
        };
        ctx.resolve(tree)
    }
}

struct ResolveCtx<'a, L> {
    loader: &'a L,
    base_dir: Option<&'a Path>,
    cache: &'a mut ResolutionCache,
    // (locator, fragment) pairs currently being expanded.
    active: Vec<(String, String)>,
}

impl<L: Loader> ResolveCtx<'_, L> {
    fn resolve(&mut self, value: Value) -> Result<Value, ResolveError> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    self.resolve(item)
                        .map_err(|e| e.at(PathSegment::Index(i)))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => match map.get(REF_KEY) {
                Some(Value::String(reference)) if is_external(reference) => {
                    let reference = reference.clone();
                    self.resolve_external(&reference)
                }
                Some(Value::String(reference)) => {
                    tracing::debug!("leaving reference {reference} in place");
                    Ok(Value::Object(map))
                }
                Some(other) => Err(ResolveError::InvalidRef { found: kind(other) }),
                None => self.resolve_map(map),
            },
            scalar => Ok(scalar),
        }
    }

    fn resolve_map(&mut self, map: Map<String, Value>) -> Result<Value, ResolveError> {
        let mut out = Map::with_capacity(map.len());
        for (key, value) in map {
            let resolved = self
                .resolve(value)
                .map_err(|e| e.at(PathSegment::Key(key.clone())))?;
            out.insert(key, resolved);
        }
        Ok(Value::Object(out))
    }

    fn resolve_external(&mut self, reference: &str) -> Result<Value, ResolveError> {
        let Ref { locator, fragment } = parse_ref(reference)?;

        let key = (locator, fragment);
        if self.active.contains(&key) {
            return Err(ResolveError::Cycle {
                reference: reference.to_string(),
            });
        }
        let (locator, fragment) = &key;

        let loader = self.loader;
        let base_dir = self.base_dir;
        let document = self.cache.get_or_load(locator, || {
            loader
                .load(locator, base_dir)
                .map_err(|source| ResolveError::Load {
                    reference: reference.to_string(),
                    source,
                })
        })?;
        let target = pointer::evaluate(document, fragment)
            .map_err(|source| ResolveError::PointerMiss {
                locator: locator.clone(),
                fragment: fragment.clone(),
                source,
            })?
            .clone();

        self.active.push(key);
        let resolved = self.resolve(target);
        self.active.pop();
        resolved
    }
}
