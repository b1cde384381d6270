// Facade tests: window validation, insufficient data, bracketing and idempotence

mod common;

use common::*;
use resmon::clock::ManualClock;
use resmon::error::{MonitorError, UtilizationError, WindowBound};
use resmon::models::DiskRate;
use resmon::monitor::{ResourceMonitor, SamplerState};
use resmon::sampler::Sampler;
use std::sync::Arc;
use std::time::Duration;

fn prepared() -> (ResourceMonitor, Sampler) {
    let clock = Arc::new(ManualClock::with_auto_advance(t0(), TICK));
    ResourceMonitor::prepare(&options(), &scripted_factory(), clock).unwrap()
}

fn ticked(n: usize) -> ResourceMonitor {
    let (monitor, mut sampler) = prepared();
    for _ in 0..n {
        sampler.tick().expect("tick appended");
    }
    monitor
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn query_before_second_snapshot_is_insufficient_data() {
    let (monitor, _sampler) = prepared();
    assert_eq!(monitor.snapshot_count(), 1);
    let err = monitor.get_utilization(Duration::from_secs(60)).unwrap_err();
    assert_eq!(err, UtilizationError::InsufficientData { available: 1 });
    assert!(err.is_retryable());
}

#[test]
fn window_above_maximum_is_out_of_range() {
    let monitor = ticked(4);
    for window in [301, 600, 86_400] {
        let err = monitor
            .get_utilization(Duration::from_secs(window))
            .unwrap_err();
        assert_eq!(
            err,
            UtilizationError::WindowOutOfRange {
                window: Duration::from_secs(window),
                bound: WindowBound::Maximum(Duration::from_secs(300)),
            }
        );
        assert!(!err.is_retryable());
    }
}

#[test]
fn zero_window_is_out_of_range() {
    let monitor = ticked(2);
    let err = monitor.get_utilization(Duration::ZERO).unwrap_err();
    assert!(matches!(
        err,
        UtilizationError::WindowOutOfRange {
            bound: WindowBound::NonPositive,
            ..
        }
    ));
}

#[test]
fn full_window_spans_every_snapshot() {
    let monitor = ticked(4);
    let u = monitor.get_utilization(Duration::from_secs(240)).unwrap();
    assert_eq!(u.span_start, t0());
    assert_eq!(u.span_end, t0() + chrono::Duration::seconds(240));
    assert!(close(u.cpu_used_fraction, 0.5));
    // memory average of 100..500
    assert_eq!(u.memory_used_bytes, 300);
    assert!(close(u.memory_used_fraction, 0.3));
    // 180 busy seconds over 240
    assert!(close(u.per_disk_busy_fraction["C:"], 0.75));
    // 420 reads over 240 s
    assert!(close(u.per_disk_rates[&DiskRate::Reads]["C:"], 1.75));
    // 8209 whole bytes over 240 s
    assert!(close(
        u.per_disk_rates[&DiskRate::WriteBytes]["C:"],
        8209.0 / 240.0
    ));
    assert_eq!(u.system_resources, resources());
}

#[test]
fn short_window_uses_snapshot_before_boundary_as_baseline() {
    let monitor = ticked(4);
    let u = monitor.get_utilization(Duration::from_secs(60)).unwrap();
    assert_eq!(u.span_start, t0() + chrono::Duration::seconds(120));
    // busy 120 -> 180 over 120 s
    assert!(close(u.per_disk_busy_fraction["C:"], 0.5));
    assert_eq!(u.window_requested, Duration::from_secs(60));
}

#[test]
fn back_to_back_queries_are_identical() {
    let monitor = ticked(3);
    let a = monitor.get_utilization(Duration::from_secs(90)).unwrap();
    let b = monitor.get_utilization(Duration::from_secs(90)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn ring_never_exceeds_capacity() {
    let mut opts = options();
    opts.max_window = Duration::from_secs(120);
    let clock = Arc::new(ManualClock::with_auto_advance(t0(), TICK));
    let (monitor, mut sampler) =
        ResourceMonitor::prepare(&opts, &scripted_factory(), clock).unwrap();
    let capacity = opts.ring_capacity();
    assert_eq!(capacity, 4);
    for _ in 0..20 {
        sampler.tick();
        assert!(monitor.snapshot_count() <= capacity);
    }
    assert_eq!(monitor.snapshot_count(), capacity);
    let u = monitor.get_utilization(Duration::from_secs(120)).unwrap();
    assert_eq!(u.span_end, t0() + chrono::Duration::seconds(20 * 60));
}

#[test]
fn prepare_rejects_window_smaller_than_interval() {
    let mut opts = options();
    opts.max_window = Duration::from_secs(30);
    let clock = Arc::new(ManualClock::new(t0()));
    let result = ResourceMonitor::prepare(&opts, &scripted_factory(), clock);
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[test]
fn prepare_rejects_window_needing_too_many_snapshots() {
    let mut opts = options();
    opts.sampling_interval = Duration::from_millis(1);
    opts.max_window = Duration::from_millis(u64::MAX);
    let clock = Arc::new(ManualClock::new(t0()));
    let result = ResourceMonitor::prepare(&opts, &scripted_factory(), clock);
    assert!(matches!(result, Err(MonitorError::Config(_))));
}

#[test]
fn queries_while_sampler_ticks_see_consistent_spans() {
    let mut opts = options();
    opts.max_window = Duration::from_secs(180);
    let clock = Arc::new(ManualClock::with_auto_advance(t0(), TICK));
    let (monitor, mut sampler) =
        ResourceMonitor::prepare(&opts, &scripted_factory(), clock).unwrap();
    let capacity = opts.ring_capacity();
    let monitor = Arc::new(monitor);
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let monitor = monitor.clone();
            let done = done.clone();
            scope.spawn(move || {
                let mut last_end = None;
                while !done.load(std::sync::atomic::Ordering::Acquire) {
                    assert!(monitor.snapshot_count() <= capacity);
                    match monitor.get_utilization(Duration::from_secs(180)) {
                        Ok(u) => {
                            assert!(u.span_start < u.span_end);
                            assert!(u.span_end - u.span_start <= chrono::Duration::seconds(240));
                            assert!((0.0..=1.0).contains(&u.cpu_used_fraction));
                            if let Some(prev) = last_end {
                                assert!(u.span_end >= prev);
                            }
                            last_end = Some(u.span_end);
                        }
                        Err(e) => assert!(e.is_retryable()),
                    }
                }
            });
        }
        for _ in 0..500 {
            sampler.tick().expect("tick appended");
        }
        done.store(true, std::sync::atomic::Ordering::Release);
    });

    assert_eq!(monitor.snapshot_count(), capacity);
    let u = monitor.get_utilization(Duration::from_secs(180)).unwrap();
    assert_eq!(u.span_end, t0() + chrono::Duration::seconds(500 * 60));
}

#[test]
fn prepare_fails_when_disk_counter_missing() {
    let mut opts = options();
    opts.disk_instances.push("Z:".into());
    let clock = Arc::new(ManualClock::new(t0()));
    let err = ResourceMonitor::prepare(&opts, &scripted_factory(), clock)
        .err()
        .expect("missing disk must abort startup");
    assert!(matches!(err, MonitorError::CounterUnavailable(_)));
    assert!(err.to_string().contains("Z:"));
}

#[test]
fn prepared_monitor_is_not_running() {
    let (monitor, _sampler) = prepared();
    assert_eq!(monitor.state(), SamplerState::Stopped);
}
