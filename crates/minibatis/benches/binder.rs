//! Benchmarks for the statement hot paths: template parsing, placeholder
//! binding and row-to-entity mapping.

#![allow(missing_docs, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use minibatis::{
    ColMetaData, Entity, MappingEntry, ParamMap, Params, ParsedTemplate, ResultMapper, RowSet,
    SqlValue,
};
use std::hint::black_box;

#[derive(Debug, Default, Entity)]
#[minibatis(type_name = "app.pojo.UserPO")]
struct User {
    id: i64,
    name: Option<String>,
    old_car: Option<String>,
    login_count: i32,
}

const UPDATE: &str = "update t_user set name = #{name}, old_car = #{oldCar}, \
                      login_count = #{loginCount} where id = #{id}";

fn bench_template_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("template");

    group.throughput(Throughput::Bytes(UPDATE.len() as u64));
    group.bench_function("parse", |b| {
        b.iter(|| ParsedTemplate::parse(black_box(UPDATE), "bench.update").unwrap())
    });

    let wide = (0..32)
        .map(|i| format!("c{i} = #{{p{i}}}"))
        .collect::<Vec<_>>()
        .join(" and ");
    let wide = format!("select * from t where {wide}");
    group.throughput(Throughput::Bytes(wide.len() as u64));
    group.bench_function("parse_32_placeholders", |b| {
        b.iter(|| ParsedTemplate::parse(black_box(&wide), "bench.wide").unwrap())
    });

    group.finish();
}

fn bench_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("bind");
    let entry = MappingEntry::new("bench.update", UPDATE).unwrap();

    let user = User {
        id: 7,
        name: Some("Li".into()),
        old_car: Some("BMW".into()),
        login_count: 3,
    };
    group.bench_function("entity", |b| {
        b.iter(|| entry.bind(&Params::from(black_box(&user))).unwrap())
    });

    let map = ParamMap::new()
        .with("id", 7i64)
        .with("name", "Li")
        .with("oldCar", "BMW")
        .with("loginCount", 3i32);
    group.bench_function("map", |b| {
        b.iter(|| entry.bind(&Params::from(black_box(&map))).unwrap())
    });

    group.finish();
}

fn bench_result_mapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let metadata = ColMetaData::from_names(["id", "name", "old_car", "login_count"]);

    for count in [10usize, 1_000] {
        let rows: Vec<Vec<SqlValue>> = (0..count)
            .map(|i| {
                vec![
                    SqlValue::BigInt(i as i64),
                    SqlValue::from("user"),
                    SqlValue::Null,
                    SqlValue::Int(1),
                ]
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &rows, |b, rows| {
            b.iter(|| {
                let set = RowSet::new(metadata.clone(), rows.clone());
                let users: Vec<User> = ResultMapper::materialize(set).unwrap();
                black_box(users)
            })
        });
    }

    group.finish();
}

fn bench_field_table_lookup(c: &mut Criterion) {
    c.bench_function("field_table/describe", |b| {
        b.iter(|| black_box(User::describe()))
    });
}

criterion_group!(
    benches,
    bench_template_parsing,
    bench_binding,
    bench_result_mapping,
    bench_field_table_lookup,
);
criterion_main!(benches);
