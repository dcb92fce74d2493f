use criterion::{black_box, criterion_group, criterion_main, Criterion};

use thoth_compiler::{compile::generate, compile_str, lex::tokenize, parsing::parse};

fn criterion_benchmark(c: &mut Criterion) {
    let source = include_str!("../tests/programs/functions.thoth");

    c.bench_function("lex functions", |b| {
        b.iter(|| black_box(tokenize(black_box(source))))
    });

    {
        let program = parse(tokenize(source).unwrap()).unwrap();

        c.bench_function("generate functions", |b| {
            b.iter(|| black_box(generate(black_box(&program))))
        });
    }

    c.bench_function("compile functions", |b| {
        b.iter(|| black_box(compile_str(black_box(source))))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
