//! Resolves a wide, deep document with the fragment cache cold and warm.

#![allow(missing_docs)]

use std::{fs, path::PathBuf};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use docres::Resolver;
use serde_json::json;
use tempfile::TempDir;

const SECTIONS: usize = 50;
const DEPTH: usize = 8;

/// Writes a root with `SECTIONS` references, each opening a chain of
/// `DEPTH` fragments that all end in one shared leaf.
fn preseed_library() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("leaf.json"),
        json!({"text": "shared"}).to_string(),
    )
    .unwrap();

    let mut sections = Vec::with_capacity(SECTIONS);
    for section in 0..SECTIONS {
        for level in 0..DEPTH {
            let next = if level + 1 == DEPTH {
                "./leaf.json".to_string()
            } else {
                format!("./s{section}-{}.json", level + 1)
            };
            fs::write(
                dir.path().join(format!("s{section}-{level}.json")),
                json!({"level": level, "next": {"$ref": next}}).to_string(),
            )
            .unwrap();
        }
        sections.push(json!({"$ref": format!("./s{section}-0.json")}));
    }

    let root = dir.path().join("root.json");
    fs::write(&root, json!({"sections": sections}).to_string()).unwrap();
    (dir, root)
}

fn resolve_chain(c: &mut Criterion) {
    let (_dir, root) = preseed_library();

    c.bench_function("resolve cold cache", |b| {
        b.iter_batched(
            Resolver::default,
            |mut resolver| {
                assert!(resolver.validate(&root).is_valid);
            },
            BatchSize::SmallInput,
        );
    });

    let mut warm = Resolver::default();
    warm.validate(&root);
    c.bench_function("resolve warm cache", |b| {
        b.iter(|| warm.validate(&root));
    });
}

criterion_group!(benches, resolve_chain);
criterion_main!(benches);
