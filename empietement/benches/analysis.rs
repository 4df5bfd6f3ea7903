//! Benchmarks pour l'analyse locale et la projection

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use empietement::{Coordinate, EncroachmentEngine, Parcel, ProjectionKind, Projector, ReferenceLayer};
use geo::{LineString, Polygon};

/// Grille de carrés de 20 m autour de la parcelle
fn grid_layer(key: &str, cells: usize) -> ReferenceLayer {
    let side = (cells as f64).sqrt().ceil() as usize;
    let mut polygons = Vec::with_capacity(cells);
    for i in 0..cells {
        let x0 = 395300.0 + (i % side) as f64 * 25.0;
        let y0 = 793750.0 + (i / side) as f64 * 25.0;
        polygons.push(Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + 20.0, y0),
                (x0 + 20.0, y0 + 20.0),
                (x0, y0 + 20.0),
                (x0, y0),
            ]),
            vec![],
        ));
    }
    ReferenceLayer::from_polygons(key, polygons)
}

fn parcel() -> Parcel {
    Parcel::new(vec![
        Coordinate::new(395400.0, 793850.0),
        Coordinate::new(395500.0, 793850.0),
        Coordinate::new(395500.0, 793950.0),
        Coordinate::new(395400.0, 793950.0),
    ])
    .unwrap()
}

fn bench_analyse(c: &mut Criterion) {
    let parcel = parcel();
    let mut group = c.benchmark_group("analyse");

    for layers in [1usize, 4, 13] {
        let engine = EncroachmentEngine::new(
            (0..layers)
                .map(|i| grid_layer(&format!("couche_{}", i), 64))
                .collect(),
        );
        group.throughput(Throughput::Elements(layers as u64));
        group.bench_with_input(BenchmarkId::from_parameter(layers), &engine, |b, engine| {
            b.iter(|| black_box(engine.analyse(black_box(&parcel)).unwrap()))
        });
    }

    group.finish();
}

fn bench_project(c: &mut Criterion) {
    let points: Vec<Coordinate> = (0..1000)
        .map(|i| Coordinate::new(395400.0 + i as f64, 793850.0 + i as f64))
        .collect();

    let mut group = c.benchmark_group("project");
    group.throughput(Throughput::Elements(points.len() as u64));

    for kind in [ProjectionKind::Linear, ProjectionKind::Utm] {
        let projector = Projector::new(kind).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", kind)),
            &points,
            |b, points| b.iter(|| black_box(projector.project_ring(black_box(points)).unwrap())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_analyse, bench_project);
criterion_main!(benches);
