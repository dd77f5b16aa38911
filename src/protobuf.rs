//! The Protocol Buffers output type graph.
//!
//! A [`Package`] is the root [`Container`]; it owns enums, messages,
//! extensions and services, and messages may own nested declarations in turn.
//! Named types that are not built yet (forward references, or members of a
//! cycle) are represented by a [`Reference`], which is bound to a resolver
//! later and dereferenced on demand.
//!
//! Declaration order is decided when the graph is emitted: siblings are
//! stable-sorted by [`Priority`] (enums, then messages, extensions, services).

use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::reference::VENDORED_PREFIX;
use crate::value::Value;

/// Emission priority of a declaration among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Enum,
    Message,
    Extension,
    Service,
}

/// Callback that produces the concrete type behind a [`Reference`].
pub type ResolveFn = dyn Fn(&str) -> Result<Type, TypeError>;

/// A node of the output type graph.
#[derive(Debug, Clone)]
pub enum Type {
    Builtin(Builtin),
    Enum(Enum),
    Message(Message),
    Map(MapType),
    Extension(Extension),
    Service(Service),
    Reference(Reference),
}

impl Type {
    pub fn name(&self) -> Cow<'_, str> {
        match self {
            Type::Builtin(b) => Cow::Borrowed(b.name()),
            Type::Enum(e) => Cow::Borrowed(&e.name),
            Type::Message(m) => Cow::Borrowed(&m.name),
            Type::Map(m) => Cow::Owned(m.name()),
            Type::Extension(e) => Cow::Borrowed(&e.base),
            Type::Service(s) => Cow::Borrowed(&s.name),
            Type::Reference(r) => Cow::Borrowed(&r.name),
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Type::Enum(_) => Priority::Enum,
            Type::Extension(_) => Priority::Extension,
            Type::Service(_) => Priority::Service,
            Type::Builtin(_) | Type::Message(_) | Type::Map(_) | Type::Reference(_) => {
                Priority::Message
            }
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference(_))
    }

    /// The concrete type, following references until a non-reference is reached.
    pub fn concrete(&self) -> Result<Type, TypeError> {
        let Type::Reference(first) = self else {
            return Ok(self.clone());
        };
        let mut seen = vec![first.name.clone()];
        let mut current = first.resolve()?;
        while let Type::Reference(next) = &current {
            if seen.contains(&next.name) {
                return Err(TypeError::ReferenceLoop {
                    name: next.name.clone(),
                });
            }
            seen.push(next.name.clone());
            current = next.resolve()?;
        }
        Ok(current)
    }

    /// Nested declarations, for types that own any.
    pub fn as_container(&self) -> Option<&dyn Container> {
        match self {
            Type::Message(m) => Some(m),
            _ => None,
        }
    }
}

// ── Scalars and well-known types ────────────────────────────────────────

/// A scalar type such as `int32` or `string`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builtin(String);

impl Builtin {
    pub fn new(name: impl Into<String>) -> Self {
        Builtin(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Names of the proto3 scalar types.
pub const SCALAR_TYPES: [&str; 7] = ["bool", "bytes", "double", "float", "int32", "int64", "string"];

/// A proto3 scalar type by name.
pub fn scalar(name: &str) -> Option<Type> {
    SCALAR_TYPES
        .contains(&name)
        .then(|| Type::Builtin(Builtin::new(name)))
}

const WELL_KNOWN_MESSAGES: &[(&str, &str)] = &[
    ("any.proto", "Any"),
    ("duration.proto", "Duration"),
    ("empty.proto", "Empty"),
    ("struct.proto", "Struct"),
    ("struct.proto", "Value"),
    ("struct.proto", "ListValue"),
    ("timestamp.proto", "Timestamp"),
    ("wrappers.proto", "BoolValue"),
    ("wrappers.proto", "BytesValue"),
    ("wrappers.proto", "DoubleValue"),
    ("wrappers.proto", "FloatValue"),
    ("wrappers.proto", "Int32Value"),
    ("wrappers.proto", "Int64Value"),
    ("wrappers.proto", "StringValue"),
    ("wrappers.proto", "UInt32Value"),
    ("wrappers.proto", "UInt64Value"),
];

/// Map a vendored reference (`google/protobuf/any.proto#Any`) to its message.
///
/// Without a fragment the file must declare exactly one well-known message.
pub fn well_known_type(reference: &str) -> Option<Type> {
    let rest = reference.strip_prefix(VENDORED_PREFIX)?;
    let (file, name) = match rest.split_once('#') {
        Some((file, fragment)) => (file, fragment.trim_start_matches('/')),
        None => (rest, ""),
    };
    let mut candidates = WELL_KNOWN_MESSAGES
        .iter()
        .filter(|(f, n)| *f == file && (name.is_empty() || *n == name));
    let (_, found) = candidates.next()?;
    if candidates.next().is_some() {
        return None;
    }
    Some(Type::Message(Message::new(format!("google.protobuf.{found}"))))
}

// ── Declarations ────────────────────────────────────────────────────────

/// A named enum with string elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    name: String,
    comment: String,
    elements: Vec<String>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Enum {
            name: name.into(),
            comment: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn add_element(&mut self, element: impl Into<String>) {
        self.elements.push(element.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }
}

/// A composite message type. Messages may nest further declarations.
#[derive(Debug, Clone)]
pub struct Message {
    name: String,
    comment: String,
    fields: Vec<Field>,
    children: Vec<Type>,
}

impl Message {
    pub fn new(name: impl Into<String>) -> Self {
        Message {
            name: name.into(),
            comment: String::new(),
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

/// A message field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    typ: Type,
    index: u32,
    repeated: bool,
    comment: String,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: Type, index: u32) -> Self {
        Field {
            name: name.into(),
            typ,
            index,
            repeated: false,
            comment: String::new(),
        }
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type, possibly a [`Reference`].
    pub fn declared_type(&self) -> &Type {
        &self.typ
    }

    /// The declared type with references dereferenced.
    pub fn concrete_type(&self) -> Result<Type, TypeError> {
        self.typ.concrete()
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_repeated(&self) -> bool {
        self.repeated
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }
}

/// `map<key, value>`.
#[derive(Debug, Clone)]
pub struct MapType {
    key: Box<Type>,
    value: Box<Type>,
}

impl MapType {
    pub fn new(key: Type, value: Type) -> Self {
        MapType {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn key(&self) -> &Type {
        &self.key
    }

    pub fn value(&self) -> &Type {
        &self.value
    }

    pub fn name(&self) -> String {
        format!("map<{}, {}>", self.key.name(), self.value.name())
    }
}

/// Fields added to an existing message via `extend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    base: String,
    #[serde(default)]
    fields: Vec<ExtensionField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionField {
    pub name: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub number: i32,
}

impl Extension {
    pub fn new(base: impl Into<String>) -> Self {
        Extension {
            base: base.into(),
            fields: Vec::new(),
        }
    }

    /// Decode one entry of an `x-extensions` list.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Extension::deserialize(value)
    }

    pub fn add_field(&mut self, field: ExtensionField) {
        self.fields.push(field);
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn fields(&self) -> &[ExtensionField] {
        &self.fields
    }
}

/// A service and its RPC endpoints.
#[derive(Debug, Clone)]
pub struct Service {
    name: String,
    rpcs: Vec<Rpc>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Service {
            name: name.into(),
            rpcs: Vec::new(),
        }
    }

    pub fn add_rpc(&mut self, rpc: Rpc) {
        self.rpcs.push(rpc);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rpcs(&self) -> &[Rpc] {
        &self.rpcs
    }
}

#[derive(Debug, Clone)]
pub struct Rpc {
    name: String,
    comment: String,
    parameter: Type,
    response: Type,
    options: Vec<RpcOption>,
}

impl Rpc {
    pub fn new(name: impl Into<String>, parameter: Type, response: Type) -> Self {
        Rpc {
            name: name.into(),
            comment: String::new(),
            parameter,
            response,
            options: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn add_option(&mut self, option: RpcOption) {
        self.options.push(option);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn parameter(&self) -> &Type {
        &self.parameter
    }

    pub fn response(&self) -> &Type {
        &self.response
    }

    pub fn options(&self) -> &[RpcOption] {
        &self.options
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RpcOption {
    /// `google.api.http` annotation.
    Http(HttpAnnotation),
    /// Any other option, e.g. from `x-options`.
    Custom { name: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpAnnotation {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

// ── Deferred references ─────────────────────────────────────────────────

/// A placeholder for a named type that is bound to its definition later.
///
/// Clones share one binding slot: binding any clone binds them all. A
/// reference is never the type it names; call [`Reference::resolve`] (or
/// [`Type::concrete`]) to get that type.
#[derive(Clone)]
pub struct Reference {
    name: String,
    slot: Rc<OnceCell<Box<ResolveFn>>>,
}

impl Reference {
    /// A reference bound to `resolver` from the start.
    pub fn new(
        name: impl Into<String>,
        resolver: impl Fn(&str) -> Result<Type, TypeError> + 'static,
    ) -> Self {
        Reference {
            name: name.into(),
            slot: Rc::new(OnceCell::from(Box::new(resolver) as Box<ResolveFn>)),
        }
    }

    /// A reference whose resolver is supplied later with [`Reference::bind`].
    pub fn unbound(name: impl Into<String>) -> Self {
        Reference {
            name: name.into(),
            slot: Rc::new(OnceCell::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_bound(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Bind the resolver. A reference can be bound once.
    pub fn bind(
        &self,
        resolver: impl Fn(&str) -> Result<Type, TypeError> + 'static,
    ) -> Result<(), TypeError> {
        self.slot
            .set(Box::new(resolver))
            .map_err(|_| TypeError::AlreadyBound {
                name: self.name.clone(),
            })
    }

    /// The bound resolver callback.
    pub fn resolver(&self) -> Option<&ResolveFn> {
        self.slot.get().map(|f| f.as_ref())
    }

    /// Call the resolver with this reference's name.
    pub fn resolve(&self) -> Result<Type, TypeError> {
        let resolver = self.resolver().ok_or_else(|| TypeError::Unbound {
            name: self.name.clone(),
        })?;
        resolver(&self.name)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

// ── Containers ──────────────────────────────────────────────────────────

/// A node that owns child declarations.
///
/// Children are owned by value, so a declaration belongs to exactly one
/// container.
pub trait Container {
    fn name(&self) -> &str;

    fn add_type(&mut self, typ: Type);

    /// Children in insertion order.
    fn children(&self) -> &[Type];

    /// Children in emission order: stable-sorted by [`Priority`].
    fn declaration_order(&self) -> Vec<&Type> {
        let mut ordered: Vec<&Type> = self.children().iter().collect();
        ordered.sort_by_key(|t| t.priority());
        ordered
    }
}

impl Container for Message {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_type(&mut self, typ: Type) {
        self.children.push(typ);
    }

    fn children(&self) -> &[Type] {
        &self.children
    }
}

/// A file-level option such as `go_package`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalOption {
    pub name: String,
    pub value: String,
}

/// The root of a protobuf definition: one big message with imports and options.
#[derive(Debug, Clone)]
pub struct Package {
    name: String,
    imports: Vec<String>,
    options: Vec<GlobalOption>,
    children: Vec<Type>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Package {
            name: name.into(),
            imports: Vec::new(),
            options: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an import; duplicates are ignored.
    pub fn add_import(&mut self, import: impl Into<String>) {
        let import = import.into();
        if !self.imports.contains(&import) {
            self.imports.push(import);
        }
    }

    pub fn add_option(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.push(GlobalOption {
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn options(&self) -> &[GlobalOption] {
        &self.options
    }
}

impl Container for Package {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_type(&mut self, typ: Type) {
        self.children.push(typ);
    }

    fn children(&self) -> &[Type] {
        &self.children
    }
}
