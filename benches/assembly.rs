use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mailprism::assemble::{assemble_raw, AssembleOptions};
use mailprism::parser::mime::{build_tree, TreeMode};
use mailprism::render::snippet::make_snippet;

fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}

fn bench_build_tree(c: &mut Criterion) {
    let raw = fixture("mixed.eml");

    c.bench_function("build_tree_canonical", |b| {
        b.iter(|| build_tree(&raw, TreeMode::Canonical).unwrap())
    });
    c.bench_function("build_tree_structural", |b| {
        b.iter(|| build_tree(&raw, TreeMode::Structural).unwrap())
    });
}

fn bench_assemble(c: &mut Criterion) {
    let raw = fixture("alternative.eml");
    let options = AssembleOptions::default();

    c.bench_function("assemble_alternative", |b| {
        b.iter(|| assemble_raw("bench", &raw, &options).unwrap())
    });
}

fn bench_snippet(c: &mut Criterion) {
    let plain = "> quoted\nSome body text that goes on for a while. ".repeat(40) + "\n--\nsig";

    c.bench_function("make_snippet", |b| b.iter(|| make_snippet(&plain)));
}

criterion_group!(benches, bench_build_tree, bench_assemble, bench_snippet);
criterion_main!(benches);
