//! Integration tests: series terms → lane engine → reconstruction and output.
//!
//! These drive the public API end to end the way the binary does, with a real
//! Taylor series as the term source.

use num_complex::Complex64;
use std::sync::atomic::AtomicBool;
use subserial::engine::accumulator::SEED;
use subserial::engine::dispatch::{BackendKind, LaneDispatch};
use subserial::engine::lane_count;
use subserial::monitor::SnapshotMonitor;
use subserial::render::{PointDump, PointRenderer};
use subserial::series::{SeriesFunction, TaylorSeries, TermSource};
use subserial::sink::{HostSink, SharedPointBuffer, SharedSink};
use subserial::{spectral, ComputeEngine, Point};
use std::time::Duration;

fn close(a: Complex64, b: Complex64, tol: f64) -> bool {
    (a - b).norm() <= tol * (1.0 + b.norm())
}

#[test]
fn test_full_mask_lane_carries_the_partial_sum() {
    let k = 4;
    let terms = 40;
    let z0 = Complex64::new(1.0, 1.5);
    let mut source = TaylorSeries::new(SeriesFunction::Exp, Complex64::new(0.0, 0.0), z0);

    let mut engine =
        ComputeEngine::new(k, LaneDispatch::serial(), HostSink::new(lane_count(k).unwrap()))
            .unwrap();
    let cancel = AtomicBool::new(false);
    assert_eq!(engine.process_terms(&mut source, terms, &cancel).unwrap(), terms);

    let points = engine.snapshot().unwrap();
    let full = points[points.len() - 1];

    // Lane W-1 includes every term; lane 0 includes none.
    assert!(close(full - SEED, source.partial_sum(), 1e-12));
    assert_eq!(points[0], SEED);
    assert!(close(full - SEED, z0.exp(), 1e-10));
}

#[test]
fn test_position_sums_match_a_direct_grouping_of_the_terms() {
    let k = 5;
    let terms = 37;
    let a = Complex64::new(0.1, 0.0);
    let z0 = Complex64::new(0.4, 0.3);

    let mut reference = TaylorSeries::new(SeriesFunction::Log1p, a, z0);
    let mut expected = vec![Complex64::new(0.0, 0.0); k as usize];
    for n in 0..terms {
        expected[n % k as usize] += reference.next_term();
    }

    let mut source = TaylorSeries::new(SeriesFunction::Log1p, a, z0);
    let mut engine =
        ComputeEngine::new(k, LaneDispatch::serial(), HostSink::new(1 << k)).unwrap();
    engine
        .process_terms(&mut source, terms, &AtomicBool::new(false))
        .unwrap();

    let recovered = spectral::position_sums(&engine.snapshot().unwrap(), k).unwrap();
    for (got, want) in recovered.iter().zip(&expected) {
        assert!(close(*got, *want, 1e-12), "{} vs {}", got, want);
    }
    let total = spectral::series_sum(&engine.snapshot().unwrap(), k).unwrap();
    assert!(close(total, source.partial_sum(), 1e-12));
}

#[test]
fn test_parallel_and_serial_runs_agree_bit_for_bit() {
    let k = 13;
    let terms = 30;
    let run = |dispatch: LaneDispatch| -> Vec<Point> {
        let mut source = TaylorSeries::new(
            SeriesFunction::Sin,
            Complex64::new(0.0, 0.0),
            Complex64::new(0.7, -0.2),
        );
        let mut engine = ComputeEngine::new(k, dispatch, HostSink::new(1 << k)).unwrap();
        engine
            .process_terms(&mut source, terms, &AtomicBool::new(false))
            .unwrap();
        engine.snapshot().unwrap()
    };

    let serial = run(LaneDispatch::serial());
    let parallel = run(LaneDispatch::new(BackendKind::Parallel, Some(4), 1024).unwrap());
    assert_eq!(serial, parallel);
}

#[test]
fn test_shared_run_with_monitor_recovers_the_same_position_sums() {
    let k = 6;
    let terms = 25;
    let series = || {
        TaylorSeries::new(
            SeriesFunction::Geometric,
            Complex64::new(0.0, 0.0),
            Complex64::new(0.5, 0.25),
        )
    };

    let buffer = SharedPointBuffer::new(1 << k);
    let monitor = SnapshotMonitor::spawn(buffer.clone(), Duration::from_millis(2)).unwrap();
    let mut shared =
        ComputeEngine::new(k, LaneDispatch::serial(), SharedSink::new(buffer.clone())).unwrap();
    assert!(shared.recenters());
    shared
        .process_terms(&mut series(), terms, &AtomicBool::new(false))
        .unwrap();
    let report = monitor.finish();
    assert_eq!(report.last.unwrap().generation, terms as u64 + 1);

    let mut host = ComputeEngine::new(k, LaneDispatch::serial(), HostSink::new(1 << k)).unwrap();
    host.process_terms(&mut series(), terms, &AtomicBool::new(false))
        .unwrap();

    let from_shared = spectral::position_sums(&buffer.snapshot().unwrap().1, k).unwrap();
    let from_host = spectral::position_sums(&host.snapshot().unwrap(), k).unwrap();
    for (s, h) in from_shared.iter().zip(&from_host) {
        assert!(close(*s, *h, 1e-12));
    }
}

#[test]
fn test_final_snapshot_renders_and_dumps() -> anyhow::Result<()> {
    let k = 8;
    let mut source = TaylorSeries::new(
        SeriesFunction::Exp,
        Complex64::new(0.0, 0.0),
        Complex64::new(1.0, 1.5),
    );
    let mut engine = ComputeEngine::new(k, LaneDispatch::serial(), HostSink::new(1 << k))?;
    engine.process_terms(&mut source, 30, &AtomicBool::new(false))?;
    let points = engine.snapshot()?;

    let dir = std::env::temp_dir().join(format!("subserial-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let image_path = dir.join("output.png");
    let dump_path = dir.join("dump.json");

    PointRenderer::default().save(&points, &image_path)?;
    let image = image::open(&image_path)?.to_rgba8();
    assert_eq!(image.dimensions(), (500, 500));
    assert!(image.pixels().any(|p| p.0 != [255, 255, 255, 255]));

    let dump = PointDump {
        parallelism: k,
        iterations: engine.iteration(),
        points: points.clone(),
    };
    dump.write(&dump_path)?;
    let read_back = PointDump::read(&dump_path)?;
    assert_eq!(read_back.iterations, 30);
    assert_eq!(read_back.points.len(), 256);
    assert_eq!(read_back.points, points);

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
