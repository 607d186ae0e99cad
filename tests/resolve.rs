//! End-to-end resolution of documents laid out on disk.

use std::{fs, path::PathBuf};

use docres::{ErrorKind, Node, OptionOverrides, Resolver, ResolverOptions};
use serde_json::{Value, json};
use tempfile::TempDir;
use test_case::test_case;

struct Library {
    dir: TempDir,
}

impl Library {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn json(&self, name: &str, content: &Value) -> PathBuf {
        self.raw(name, &serde_json::to_string_pretty(content).unwrap())
    }

    /// The key a file is listed under in `resolved`.
    fn resolved_key(&self, name: &str) -> PathBuf {
        fs::canonicalize(self.dir.path().join(name)).unwrap()
    }

    fn raw(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Writes `root.json -> 1.json -> ... -> {length}.json`.
    fn chain(&self, length: usize) -> PathBuf {
        for i in 1..=length {
            let content = if i == length {
                json!({"end": i})
            } else {
                json!({"next": {"$ref": format!("./{}.json", i + 1)}})
            };
            self.json(&format!("{i}.json"), &content);
        }
        if length == 0 {
            self.json("root.json", &json!({"end": 0}))
        } else {
            self.json("root.json", &json!({"next": {"$ref": "./1.json"}}))
        }
    }
}

fn merged(document: Option<&Node>) -> Value {
    Value::from(document.expect("a merged document"))
}

#[test]
fn document_without_references_is_unchanged() {
    let library = Library::new();
    let content = json!({"title": "Book", "tags": ["a", "b"], "pages": 3});
    let root = library.json("book.json", &content);

    let result = Resolver::default().validate(&root);

    assert!(result.is_valid);
    assert_eq!(merged(result.document.as_ref()), content);
    let resolution = result.file_resolution.unwrap();
    assert!(resolution.resolved.is_empty());
    assert_eq!(resolution.performance_metrics.total_files, 0);
}

#[test]
fn missing_reference_is_reported_once() {
    let library = Library::new();
    let root = library.json("book.json", &json!({"intro": {"$ref": "./missing.json"}}));

    let result = Resolver::default().validate(&root);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::FileNotFound);
    assert!(result.errors[0].message.contains("does not exist"));
    assert_eq!(result.errors[0].pointer, "/intro");
    assert_eq!(
        merged(result.document.as_ref()),
        json!({"intro": {"$ref": "./missing.json"}})
    );
}

#[test]
fn chapters_are_substituted_in_place() {
    let library = Library::new();
    library.json("chapters/one.json", &json!({"title": "One", "body": "..."}));
    library.raw("chapters/two.yaml", "title: Two\nbody: ...\n");
    let root = library.json(
        "book.json",
        &json!({
            "title": "Book",
            "chapters": [
                {"$ref": "./chapters/one.json", "refMetadata": {"title": "Chapter 1", "version": 1}},
                {"$ref": "./chapters/two.yaml"}
            ]
        }),
    );

    let result = Resolver::default().validate(&root);

    assert!(result.is_valid, "{:?}", result.errors);
    assert_eq!(
        merged(result.document.as_ref()),
        json!({
            "title": "Book",
            "chapters": [
                {"title": "One", "body": "..."},
                {"title": "Two", "body": "..."}
            ]
        })
    );

    let resolution = result.file_resolution.unwrap();
    assert_eq!(resolution.resolved.len(), 2);
    assert!(resolution.circular_references.is_empty());

    let one = &resolution.resolved[&library.resolved_key("chapters/one.json")];
    assert_eq!(one.title.as_deref(), Some("Chapter 1"));
    assert_eq!(one.version.as_deref(), Some("1"));
    assert_eq!(one.depth, 1);
    assert_eq!(one.fingerprint.len(), 64);
}

#[test]
fn mutual_references_are_a_cycle() {
    let library = Library::new();
    library.json("a.json", &json!({"b": {"$ref": "./b.json"}}));
    library.json("b.json", &json!({"a": {"$ref": "./a.json"}}));
    let root = library.json("root.json", &json!({"start": {"$ref": "./a.json"}}));

    let result = Resolver::default().validate(&root);

    assert!(!result.is_valid);
    assert_eq!(result.circular_references(), ["a.json -> b.json -> a.json"]);
    assert!(
        result
            .errors
            .iter()
            .any(|error| error.kind == ErrorKind::CircularReference)
    );
    assert_eq!(
        merged(result.document.as_ref()),
        json!({"start": {"b": {"a": {"$ref": "./a.json"}}}})
    );
}

#[test_case(3, 5, true; "well within the limit")]
#[test_case(5, 5, true; "exactly at the limit")]
#[test_case(6, 5, false; "one past the limit")]
#[test_case(1, 0, false; "references disabled")]
#[test_case(0, 0, true; "no references at depth zero")]
fn chain_length_against_max_depth(length: usize, max_depth: usize, valid: bool) {
    let library = Library::new();
    let root = library.chain(length);

    let result =
        Resolver::default().validate_with(&root, &OptionOverrides::default().max_depth(max_depth));

    assert_eq!(result.is_valid, valid, "{:?}", result.errors);
    if !valid {
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ErrorKind::DepthExceeded);
    }
}

#[test]
fn existing_files_outside_the_root_are_not_read() {
    let outer = Library::new();
    outer.json("secret.json", &json!({"password": "hunter2"}));
    let root = outer.json("docs/book.json", &json!({"leak": {"$ref": "../secret.json"}}));

    let result = Resolver::default().validate(&root);

    assert!(!result.is_valid);
    assert_eq!(result.errors[0].kind, ErrorKind::PathEscapeRejected);
    let resolution = result.file_resolution.unwrap();
    assert!(resolution.resolved.is_empty());
    assert_eq!(resolution.performance_metrics.total_files, 0);
}

#[test_case("/etc/passwd.json", ErrorKind::AbsolutePathRejected)]
#[test_case("C:\\docs\\a.json", ErrorKind::AbsolutePathRejected)]
#[test_case("file:///etc/a.json", ErrorKind::AbsolutePathRejected)]
#[test_case("a.json", ErrorKind::MalformedReference)]
#[test_case("./notes.txt", ErrorKind::MalformedReference)]
#[test_case("../../a.json", ErrorKind::PathEscapeRejected)]
fn hostile_references_are_rejected(reference: &str, kind: ErrorKind) {
    let library = Library::new();
    library.json("a.json", &json!({}));
    let root = library.json("book.json", &json!({"x": {"$ref": reference}}));

    let result = Resolver::default().validate(&root);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, kind);
    assert_eq!(result.errors[0].path, reference);
}

#[test]
fn absolute_path_to_an_existing_file_is_rejected() {
    let library = Library::new();
    let target = library.json("a.json", &json!({"secret": true}));
    let reference = target.display().to_string();
    let root = library.json("book.json", &json!({"x": {"$ref": reference}}));

    let result = Resolver::default().validate(&root);

    assert!(!result.is_valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::AbsolutePathRejected);
    let resolution = result.file_resolution.unwrap();
    assert!(resolution.resolved.is_empty());
    assert_eq!(resolution.performance_metrics.total_files, 0);
    assert_eq!(
        merged(result.document.as_ref()),
        json!({"x": {"$ref": reference}})
    );
}

#[test]
fn non_string_reference_is_left_untouched() {
    let library = Library::new();
    let content = json!({"x": {"$ref": 42, "refMetadata": {"title": "Answer"}}});
    let root = library.json("book.json", &content);

    let result = Resolver::default().validate(&root);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::MalformedReference);
    assert_eq!(merged(result.document.as_ref()), content);
}

#[test]
fn repeated_runs_agree() {
    let library = Library::new();
    library.json("shared.json", &json!({"n": 1}));
    library.json("a.json", &json!({"s": {"$ref": "./shared.json"}}));
    let root = library.json(
        "root.json",
        &json!({"a": {"$ref": "./a.json"}, "s": {"$ref": "./shared.json"}}),
    );
    let mut resolver = Resolver::default();

    let first = resolver.validate(&root);
    resolver.clear_cache();
    let second = resolver.validate(&root);

    assert_eq!(first.document, second.document);
    assert_eq!(first.errors, second.errors);
    let (first, second) = (
        first.file_resolution.unwrap(),
        second.file_resolution.unwrap(),
    );
    assert_eq!(
        first.resolved.keys().collect::<Vec<_>>(),
        second.resolved.keys().collect::<Vec<_>>()
    );
    assert_eq!(first.performance_metrics.total_files, 2);
    assert_eq!(
        first.performance_metrics.total_files,
        second.performance_metrics.total_files
    );
}

#[test]
fn cold_cache_metrics_count_every_resolved_file() {
    let library = Library::new();
    library.json("leaf.json", &json!("leaf"));
    library.json("mid.json", &json!([{"$ref": "./leaf.json"}, {"$ref": "./leaf.json"}]));
    let root = library.json(
        "root.json",
        &json!({"left": {"$ref": "./mid.json"}, "right": {"$ref": "./mid.json"}}),
    );

    let result = Resolver::default().validate(&root);
    let resolution = result.file_resolution.unwrap();

    assert_eq!(resolution.performance_metrics.total_files, resolution.resolved.len());
    let leaf = &resolution.resolved[&library.resolved_key("leaf.json")];
    assert_eq!(leaf.reference_count, 4);
    assert_eq!(leaf.depth, 2);
    assert_eq!(
        merged(result.document.as_ref()),
        json!({"left": ["leaf", "leaf"], "right": ["leaf", "leaf"]})
    );
}

#[test]
fn warm_cache_reads_nothing_from_disk() {
    let library = Library::new();
    library.json("a.json", &json!(1));
    let root = library.json("root.json", &json!({"a": {"$ref": "./a.json"}}));
    let mut resolver = Resolver::default();

    resolver.validate(&root);
    let warm = resolver.validate(&root);

    let resolution = warm.file_resolution.unwrap();
    assert_eq!(resolution.resolved.len(), 1);
    assert_eq!(resolution.performance_metrics.total_files, 0);
}

#[test]
fn oversized_fragments_are_rejected() {
    let library = Library::new();
    library.raw("big.json", &format!("\"{}\"", "x".repeat(256)));
    let root = library.json("root.json", &json!({"big": {"$ref": "./big.json"}}));

    let result =
        Resolver::default().validate_with(&root, &OptionOverrides::default().max_file_size(128));

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::FileTooLarge);
}

#[test]
fn unparseable_fragments_are_reported() {
    let library = Library::new();
    library.raw("broken.json", "{\"unterminated\": ");
    library.raw("broken.yaml", "key: [unclosed\n");
    let root = library.json(
        "root.json",
        &json!({"j": {"$ref": "./broken.json"}, "y": {"$ref": "./broken.yaml"}}),
    );

    let result = Resolver::default().validate(&root);

    let kinds: Vec<_> = result.errors.iter().map(|error| error.kind).collect();
    assert_eq!(kinds, [ErrorKind::ParseError, ErrorKind::ParseError]);
}

#[test]
fn extension_overrides_narrow_what_may_be_referenced() {
    let library = Library::new();
    library.raw("a.yaml", "a: 1\n");
    let root = library.json("root.json", &json!({"a": {"$ref": "./a.yaml"}}));
    let mut resolver = Resolver::default();

    assert!(resolver.validate(&root).is_valid);

    let narrowed = resolver.validate_with(
        &root,
        &OptionOverrides::default().allowed_file_extensions([".json"]),
    );
    assert_eq!(narrowed.errors[0].kind, ErrorKind::MalformedReference);
}

#[test]
fn options_round_trip_through_toml() {
    let library = Library::new();
    let path = library.dir.path().join("docres.toml");
    let mut options = ResolverOptions::default();
    options.max_depth = 4;
    options.max_file_size = 2048;
    options.root_dir = Some(library.dir.path().to_path_buf());
    options.set_allowed_file_extensions(["JSON"]);

    options.save(&path).unwrap();

    let loaded = ResolverOptions::load(&path).unwrap();
    assert_eq!(loaded, options);
    assert_eq!(loaded.allowed_file_extensions(), [".json"]);
}

#[test]
fn report_serialises_in_camel_case() {
    let library = Library::new();
    library.json("a.json", &json!({}));
    let root = library.json("root.json", &json!({"a": {"$ref": "./a.json"}}));

    let report = serde_json::to_value(Resolver::default().validate(&root)).unwrap();

    assert_eq!(report["isValid"], json!(true));
    assert!(report["fileResolution"]["performanceMetrics"]["totalFiles"].is_number());
    assert!(report["fileResolution"]["circularReferences"].is_array());
}
