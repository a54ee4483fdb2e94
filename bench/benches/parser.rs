use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tacc::{lexer, parser::parse, token::Token};

static INPUT: &str = include_str!("../../demos/big.c");

fn parser(tokens: &[Token]) {
    let program = parse(tokens).unwrap();
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let tokens = lexer::tokenize(INPUT).unwrap();

    c.bench_function("parser", |b| {
        b.iter(|| {
            black_box(parser(black_box(&tokens)));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
