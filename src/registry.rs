//! Two-phase construction of a type graph with forward and circular references.
//!
//! Phase one: the translation layer [`define`](TypeRegistry::define)s every
//! named type it builds and asks for a [`reference`](TypeRegistry::reference)
//! whenever it needs a type it may not have built yet. Phase two:
//! [`bind`](TypeRegistry::bind) freezes the definitions and binds every
//! placeholder to a lookup in the frozen set.
//!
//! Bound resolvers only hold a weak handle on the definitions, so the graph
//! does not keep itself alive through its own references.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use crate::error::TypeError;
use crate::protobuf::{Container, Reference, Type};

type Definitions = BTreeMap<String, Type>;

/// Named types under construction.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Definitions,
    placeholders: Vec<Reference>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a finished type under its name, returning any previous definition.
    pub fn define(&mut self, typ: Type) -> Option<Type> {
        self.types.insert(typ.name().into_owned(), typ)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// A placeholder for `name`, bound when the registry is bound.
    pub fn reference(&mut self, name: impl Into<String>) -> Type {
        let reference = Reference::unbound(name);
        self.placeholders.push(reference.clone());
        Type::Reference(reference)
    }

    /// Number of placeholders handed out so far.
    pub fn pending(&self) -> usize {
        self.placeholders.len()
    }

    /// Freeze the definitions and bind every placeholder.
    ///
    /// Fails with [`TypeError::Unresolved`] naming every placeholder that has
    /// no definition; nothing is bound in that case.
    pub fn bind(self) -> Result<BoundRegistry, TypeError> {
        let TypeRegistry {
            types,
            placeholders,
        } = self;

        let missing: BTreeSet<String> = placeholders
            .iter()
            .filter(|r| !types.contains_key(r.name()))
            .map(|r| r.name().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(TypeError::Unresolved {
                names: missing.into_iter().collect(),
            });
        }

        let types = Rc::new(types);
        for placeholder in &placeholders {
            let definitions = Rc::downgrade(&types);
            placeholder.bind(move |name| lookup(&definitions, name))?;
        }
        tracing::debug!(
            "bound {} references against {} types",
            placeholders.len(),
            types.len()
        );
        Ok(BoundRegistry { types })
    }
}

fn lookup(definitions: &Weak<Definitions>, name: &str) -> Result<Type, TypeError> {
    let types = definitions
        .upgrade()
        .ok_or_else(|| TypeError::RegistryDropped {
            name: name.to_string(),
        })?;
    types.get(name).cloned().ok_or_else(|| TypeError::Unknown {
        name: name.to_string(),
    })
}

/// A frozen set of definitions with every placeholder bound.
#[derive(Debug)]
pub struct BoundRegistry {
    types: Rc<Definitions>,
}

impl BoundRegistry {
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// The concrete type registered as `name`.
    pub fn resolve(&self, name: &str) -> Result<Type, TypeError> {
        self.get(name)
            .ok_or_else(|| TypeError::Unknown {
                name: name.to_string(),
            })?
            .concrete()
    }

    /// Definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.types.iter().map(|(name, typ)| (name.as_str(), typ))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Check that every reference reachable from a definition resolves.
    pub fn verify(&self) -> Result<(), TypeError> {
        let mut references = Vec::new();
        for typ in self.types.values() {
            collect_references(typ, &mut references);
        }
        let failed: BTreeSet<String> = references
            .into_iter()
            .filter(|r| r.resolve().is_err())
            .map(|r| r.name().to_string())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TypeError::Unresolved {
                names: failed.into_iter().collect(),
            })
        }
    }
}

fn collect_references<'a>(typ: &'a Type, out: &mut Vec<&'a Reference>) {
    match typ {
        Type::Reference(r) => out.push(r),
        Type::Message(m) => {
            for field in m.fields() {
                collect_references(field.declared_type(), out);
            }
            for child in m.children() {
                collect_references(child, out);
            }
        }
        Type::Map(m) => {
            collect_references(m.key(), out);
            collect_references(m.value(), out);
        }
        Type::Service(s) => {
            for rpc in s.rpcs() {
                collect_references(rpc.parameter(), out);
                collect_references(rpc.response(), out);
            }
        }
        Type::Builtin(_) | Type::Enum(_) | Type::Extension(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protobuf::{Enum, Field, Message, scalar};

    #[test]
    fn forward_and_circular_references_bind() {
        let mut registry = TypeRegistry::new();

        // Node refers to itself and to Tree, which is defined later.
        let mut node = Message::new("Node");
        node.add_field(Field::new("children", registry.reference("Node"), 1).repeated());
        node.add_field(Field::new("tree", registry.reference("Tree"), 2));
        registry.define(Type::Message(node));

        let mut tree = Message::new("Tree");
        tree.add_field(Field::new("root", registry.reference("Node"), 1));
        tree.add_field(Field::new("name", scalar("string").unwrap(), 2));
        registry.define(Type::Message(tree));
        assert_eq!(registry.pending(), 3);

        let bound = registry.bind().unwrap();
        bound.verify().unwrap();

        let Type::Message(node) = bound.resolve("Node").unwrap() else {
            panic!("Node should be a message");
        };
        let tree = node.fields()[1].concrete_type().unwrap();
        assert_eq!(tree.name(), "Tree");
        let Type::Message(tree) = tree else {
            panic!("Tree should be a message");
        };
        assert_eq!(tree.fields()[0].concrete_type().unwrap().name(), "Node");
    }

    #[test]
    fn bind_reports_every_missing_name() {
        let mut registry = TypeRegistry::new();
        let mut msg = Message::new("A");
        msg.add_field(Field::new("b", registry.reference("B"), 1));
        msg.add_field(Field::new("c", registry.reference("C"), 2));
        registry.define(Type::Message(msg));

        assert_eq!(
            registry.bind().unwrap_err(),
            TypeError::Unresolved {
                names: vec!["B".to_string(), "C".to_string()]
            }
        );
    }

    #[test]
    fn references_report_dropped_registry() {
        let mut registry = TypeRegistry::new();
        let handle = registry.reference("Color");
        registry.define(Type::Enum(Enum::new("Color")));

        let bound = registry.bind().unwrap();
        assert!(matches!(handle.concrete().unwrap(), Type::Enum(_)));

        drop(bound);
        assert_eq!(
            handle.concrete().unwrap_err(),
            TypeError::RegistryDropped {
                name: "Color".to_string()
            }
        );
    }

    #[test]
    fn verify_flags_references_bound_elsewhere() {
        let mut registry = TypeRegistry::new();
        let mut msg = Message::new("A");
        // Built outside the registry and never bound.
        msg.add_field(Field::new(
            "ghost",
            Type::Reference(Reference::unbound("Ghost")),
            1,
        ));
        registry.define(Type::Message(msg));

        let bound = registry.bind().unwrap();
        assert_eq!(
            bound.verify().unwrap_err(),
            TypeError::Unresolved {
                names: vec!["Ghost".to_string()]
            }
        );
    }

    #[test]
    fn redefinition_returns_previous() {
        let mut registry = TypeRegistry::new();
        assert!(registry.define(Type::Enum(Enum::new("E"))).is_none());
        assert!(registry.define(Type::Message(Message::new("E"))).is_some());
        assert!(matches!(registry.get("E"), Some(Type::Message(_))));
    }
}
