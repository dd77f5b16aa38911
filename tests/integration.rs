//! End-to-end tests for openapi2proto.
//!
//! These tests write small multi-file OpenAPI fixtures to a temporary
//! directory and run the full pipeline: decode → normalize → resolve, plus
//! a two-phase type graph build.

use std::path::Path;

use serde_json::json;

use openapi2proto::error::{LoadError, ResolveError};
use openapi2proto::loader::load_document;
use openapi2proto::protobuf::{Container, Enum, Field, Message, Package, Priority, Type, scalar};
use openapi2proto::registry::TypeRegistry;
use openapi2proto::resolver::{ResolveOptions, Resolver};
use openapi2proto::value::normalize;

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

const PETSTORE: &str = r##"
openapi: 3.0.0
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        200:
          description: A list of pets
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: "definitions/pet.yaml#/Pet"
        default:
          description: Error
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Error"
components:
  schemas:
    Error:
      type: object
      properties:
        code:
          type: integer
    Timestamp:
      $ref: "google/protobuf/timestamp.proto#Timestamp"
"##;

const PET: &str = r##"
Pet:
  type: object
  properties:
    id:
      type: integer
      format: int64
    tag:
      $ref: "common.json#/Tag"
"##;

const COMMON: &str = r#"{"Tag": {"type": "string", "enum": ["a", "b"]}}"#;

#[test]
fn resolves_multi_file_petstore() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "petstore.yaml", PETSTORE);
    write(dir.path(), "definitions/pet.yaml", PET);
    // Nested refs resolve against the caller's base directory, not the
    // directory of the document that contains them.
    write(dir.path(), "common.json", COMMON);

    let document = load_document(&dir.path().join("petstore.yaml")).unwrap();
    let resolved = Resolver::new()
        .resolve(document, &ResolveOptions::new().with_dir(dir.path()))
        .unwrap();

    let get = &resolved["paths"]["/pets"]["get"];
    assert_eq!(
        get["responses"]["200"]["content"]["application/json"]["schema"]["items"],
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer", "format": "int64"},
                "tag": {"type": "string", "enum": ["a", "b"]},
            }
        })
    );

    // In-document and vendored refs are untouched.
    assert_eq!(
        get["responses"]["default"]["content"]["application/json"]["schema"],
        json!({"$ref": "#/components/schemas/Error"})
    );
    assert_eq!(
        resolved["components"]["schemas"]["Timestamp"],
        json!({"$ref": "google/protobuf/timestamp.proto#Timestamp"})
    );
}

#[test]
fn external_fragment_under_base_dir() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "refs.yaml", "Bar:\n  type: integer\n");

    let resolved = Resolver::new()
        .resolve(
            json!({"$ref": "refs.yaml#/Bar"}),
            &ResolveOptions::new().with_dir(dir.path()),
        )
        .unwrap();
    assert_eq!(resolved, json!({"type": "integer"}));
}

#[test]
fn document_without_refs_equals_its_normalized_form() {
    let raw: serde_yaml::Value =
        serde_yaml::from_str("a:\n  1: one\n  true: [x, {2.5: y}]\nb: null\n").unwrap();
    let expected = normalize(raw.clone());
    let resolved = Resolver::new()
        .resolve(raw, &ResolveOptions::new())
        .unwrap();
    assert_eq!(resolved, expected);
    assert_eq!(resolved, json!({"a": {"1": "one", "true": ["x", {"2.5": "y"}]}, "b": null}));
}

#[test]
fn missing_fragment_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "refs.json", r#"{"Bar": 1}"#);

    let err = Resolver::new()
        .resolve(
            json!({"components": {"schemas": {"X": {"$ref": "refs.json#/Missing"}}}}),
            &ResolveOptions::new().with_dir(dir.path()),
        )
        .unwrap_err();
    assert_eq!(err.path(), "/components/schemas/X");
    assert!(matches!(err.root_cause(), ResolveError::PointerMiss { .. }));
}

#[test]
fn unreadable_file_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Resolver::new()
        .resolve(
            json!({"items": [{"$ref": "absent.yaml#/A"}]}),
            &ResolveOptions::new().with_dir(dir.path()),
        )
        .unwrap_err();
    assert_eq!(err.path(), "/items/0");
    assert!(matches!(
        err.root_cause(),
        ResolveError::Load {
            source: LoadError::Read { .. },
            ..
        }
    ));
}

#[test]
fn cross_file_cycle_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.yaml", "A:\n  next:\n    $ref: b.yaml#/B\n");
    write(dir.path(), "b.yaml", "B:\n  prev:\n    $ref: a.yaml#/A\n");

    let err = Resolver::new()
        .resolve(
            json!({"$ref": "a.yaml#/A"}),
            &ResolveOptions::new().with_dir(dir.path()),
        )
        .unwrap_err();
    assert!(matches!(err.root_cause(), ResolveError::Cycle { .. }));
}

#[test]
fn non_string_ref_is_invalid() {
    let err = Resolver::new()
        .resolve(json!({"$ref": 3}), &ResolveOptions::new())
        .unwrap_err();
    assert!(matches!(err, ResolveError::InvalidRef { found: "number" }));
}

#[test]
fn type_graph_with_cycle_builds_and_orders() {
    let mut registry = TypeRegistry::new();

    let mut person = Message::new("Person");
    person.add_field(Field::new("name", scalar("string").unwrap(), 1));
    person.add_field(Field::new("employer", registry.reference("Company"), 2));
    person.add_field(Field::new("status", registry.reference("Status"), 3));

    let mut company = Message::new("Company");
    company.add_field(Field::new("employees", registry.reference("Person"), 1).repeated());

    let mut status = Enum::new("Status");
    status.add_element("ACTIVE");
    status.add_element("RETIRED");

    let mut package = Package::new("hr");
    for typ in [
        Type::Message(person),
        Type::Message(company),
        Type::Enum(status),
    ] {
        registry.define(typ.clone());
        package.add_type(typ);
    }

    let bound = registry.bind().unwrap();
    bound.verify().unwrap();

    let order: Vec<_> = package
        .declaration_order()
        .iter()
        .map(|t| (t.priority(), t.name().into_owned()))
        .collect();
    assert_eq!(
        order,
        [
            (Priority::Enum, "Status".to_string()),
            (Priority::Message, "Person".to_string()),
            (Priority::Message, "Company".to_string()),
        ]
    );

    // The references inside the package's own copies resolve through the registry.
    let Type::Message(person) = &package.children()[0] else {
        panic!("Person should be a message");
    };
    let employer = person.fields()[1].concrete_type().unwrap();
    let Type::Message(company) = employer else {
        panic!("Company should be a message");
    };
    assert!(company.fields()[0].is_repeated());
    assert_eq!(
        company.fields()[0].concrete_type().unwrap().name(),
        "Person"
    );
    assert!(matches!(
        person.fields()[2].concrete_type().unwrap(),
        Type::Enum(_)
    ));
}

#[cfg(feature = "download")]
mod remote {
    use std::net::SocketAddr;
    use std::thread::JoinHandle;

    use super::*;

    /// Serve `routes` for exactly `requests` requests, returning the paths seen.
    fn serve(
        routes: Vec<(&'static str, u16, &'static str)>,
        requests: usize,
    ) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            for _ in 0..requests {
                let request = server.recv().unwrap();
                let path = request.url().to_string();
                let (status, body) = routes
                    .iter()
                    .find(|(p, _, _)| *p == path)
                    .map(|(_, s, b)| (*s, *b))
                    .unwrap_or((404, "not found"));
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(tiny_http::StatusCode(status));
                request.respond(response).unwrap();
                seen.push(path);
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn fetches_remote_yaml_once() {
        let (addr, server) = serve(
            vec![("/defs.yaml", 200, "Pet:\n  type: object\nTag:\n  type: string\n")],
            1,
        );
        let base = format!("http://{addr}/defs.yaml");

        let resolved = Resolver::new()
            .resolve(
                json!({
                    "pet": {"$ref": format!("{base}#/Pet")},
                    "tag": {"$ref": format!("{base}#/Tag")},
                }),
                &ResolveOptions::new(),
            )
            .unwrap();

        assert_eq!(
            resolved,
            json!({"pet": {"type": "object"}, "tag": {"type": "string"}})
        );
        assert_eq!(server.join().unwrap(), vec!["/defs.yaml".to_string()]);
    }

    #[test]
    fn remote_error_status_is_load_error() {
        let (addr, server) = serve(vec![], 1);

        let err = Resolver::new()
            .resolve(
                json!({"$ref": format!("http://{addr}/missing.json#/X")}),
                &ResolveOptions::new(),
            )
            .unwrap_err();

        assert!(
            matches!(
                &err,
                ResolveError::Load {
                    source: LoadError::Status { status: 404, .. },
                    ..
                }
            ),
            "got {err:?}"
        );
        server.join().unwrap();
    }
}
