//! # Path Selection Benchmark

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};

use lpl_lib::{
    loc::{Pose, TrackPose},
    operator::{Axes, Mode},
    path_lib::{LibraryDims, PathLibrary},
    path_sel::{PathSelParams, PathSelector, SelectionInput},
};
use nalgebra::Vector3;
use util::module::State;

fn path_sel_benchmark(c: &mut Criterion) {
    // ---- Build a full size synthetic library ----

    let lib = Arc::new(PathLibrary::generate_fan(LibraryDims::default()).unwrap());

    let mut path_sel = PathSelector::default();
    path_sel
        .init((PathSelParams::default(), lib))
        .unwrap();

    // A wall across the forward groups with a gap to the left, plus scattered ground returns
    let mut cloud = Vec::new();
    for i in 0..40 {
        for k in 0..10 {
            let y = -2.0 + i as f64 * 0.1;
            if y > 0.8 && y < 1.4 {
                continue;
            }
            cloud.push(Vector3::new(1.5, y, -0.5 + k as f64 * 0.1));
        }
    }
    for i in 0..30 {
        for j in 0..30 {
            cloud.push(Vector3::new(0.1 * i as f64, -1.5 + 0.1 * j as f64, -1.0));
        }
    }

    let input = SelectionInput {
        time_s: 0.0,
        cloud_m: cloud,
        goal_m: Vector3::new(10.0, 0.0, 0.0),
        track: TrackPose::default(),
        vehicle: Pose::default(),
        sensor_pitch_offset_rad: 0.0,
        mode: Mode::Autonomous,
        axes: Axes {
            fwd: 1.0,
            ..Default::default()
        },
    };

    c.bench_function("PathSelector::proc", |b| {
        b.iter(|| path_sel.proc(&input).unwrap())
    });

    // Everything blocked, so every trial scale is searched
    let blocked = SelectionInput {
        cloud_m: (0..200)
            .flat_map(|i| {
                (0..20).map(move |k| Vector3::new(0.3, -3.0 + 0.03 * i as f64, -0.5 + 0.05 * k as f64))
            })
            .collect(),
        ..input.clone()
    };

    c.bench_function("PathSelector::proc::all_blocked", |b| {
        b.iter(|| path_sel.proc(&blocked).unwrap())
    });
}

criterion_group!(benches, path_sel_benchmark);
criterion_main!(benches);
