// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Build and projection benchmarks over a synthetic fleet
//!
//! The fleet has one root file including `teams` team files, each declaring
//! `repos` repositories, an inheriting group and a tagged repository set.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use repograph::prelude::*;
use serde_json::Value;

fn make_fleet(teams: usize, repos: usize) -> MemoryLoader {
    let mut root = Config {
        version: "1.0".into(),
        ..Config::default()
    };
    root.global.base_path = "/src".into();
    root.groups.insert("all".into(), vec![]);

    let mut loader = MemoryLoader::new();
    for team in 0..teams {
        root.includes.push(format!("configs/team{team}/team.yaml"));
        let mut config = Config {
            repositories: (0..repos)
                .map(|i| {
                    let mut repo = Repository {
                        name: format!("team{team}-repo{i}"),
                        path: format!("team{team}/repo{i}"),
                        url: format!("https://example.com/team{team}/repo{i}.git"),
                        ..Repository::default()
                    };
                    repo.tags.insert("tier".into(), Value::from((i % 3) as u64));
                    repo.labels.push(format!("team{team}"));
                    repo
                })
                .collect(),
            ..Config::default()
        };
        config.groups.insert("all".into(), vec![]);
        loader.insert(format!("/fleet/configs/team{team}/team.yaml"), config);
    }
    loader.insert("/fleet/root.yaml", root);
    loader
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for teams in [4usize, 16, 64] {
        let loader = make_fleet(teams, 25);
        group.bench_with_input(BenchmarkId::from_parameter(teams), &loader, |b, loader| {
            b.iter(|| {
                GraphBuilder::new(loader)
                    .build(black_box("/fleet/root.yaml"))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_projection(c: &mut Criterion) {
    let graph = GraphBuilder::new(make_fleet(32, 25))
        .build("/fleet/root.yaml")
        .unwrap();

    c.bench_function("groups_for_display", |b| {
        b.iter(|| black_box(&graph).groups_for_display());
    });
    c.bench_function("merged_config", |b| {
        b.iter(|| black_box(&graph).merged_config());
    });
    c.bench_function("repositories_in_scope", |b| {
        let scope = graph.get_nodes_by_path("root/team7")[0].id.clone();
        b.iter(|| graph.get_repositories_in_scope(black_box(&scope)).len());
    });
}

criterion_group!(benches, bench_build, bench_projection);
criterion_main!(benches);
