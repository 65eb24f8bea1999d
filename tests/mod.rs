use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use itertools::Itertools;
use rand::{prelude::Distribution, rngs::SmallRng, SeedableRng};
use statrs::distribution::Erlang;
use tokio::time;

use adaptive_pacer::{operation, Operation, Pacer, Phase, RateSpec, Report};

/// An operation which takes `latency` and counts its completed calls.
fn sleeping(latency: Duration, calls: &Arc<AtomicU64>) -> impl Operation {
    let calls = calls.clone();
    move || {
        let calls = calls.clone();
        async move {
            time::sleep(latency).await;
            calls.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Run the pacer until `cancellation`, collecting every report published along the way.
///
/// The last report is the final one, taken after all workers have exited.
async fn run_collecting(
    pacer: Pacer,
    operation: impl Operation + 'static,
    cancellation: impl Future<Output = ()>,
) -> Vec<Report> {
    let mut reporter = pacer.reporter();
    let collect = tokio::spawn(async move {
        let mut reports = vec![];
        while let Some(report) = reporter.changed().await {
            reports.push(report);
        }
        reports
    });

    let last = pacer.run(operation, cancellation).await;

    let reports = collect.await.unwrap();
    assert_eq!(reports.last(), Some(&last));
    reports
}

fn in_band(report: &Report, band: f64) -> bool {
    let rps = report.rps();
    let target = report.target_rps();
    rps >= target * (1.0 - band) && rps <= target * (1.0 + band)
}

/// Assert the achieved rate reaches the band and never leaves it again.
fn assert_settles(reports: &[Report], band: f64) {
    let settled = reports.iter().skip_while(|r| !in_band(r, band)).collect_vec();

    assert!(!settled.is_empty(), "never reached the target: {reports:#?}");
    assert!(
        settled.iter().all(|r| in_band(r, band)),
        "left the band after reaching it: {reports:#?}"
    );
}

#[tokio::test(start_paused = true)]
async fn slow_operation_converges_on_target() {
    let calls = Arc::new(AtomicU64::new(0));
    let pacer = Pacer::new(RateSpec::per_second(10).with_error_band(0.1)).unwrap();

    let reports = run_collecting(
        pacer,
        sleeping(Duration::from_millis(300), &calls),
        time::sleep(Duration::from_secs(10)),
    )
    .await;

    let (ticks, last) = reports.split_at(reports.len() - 1);
    let last = &last[0];

    assert_eq!(
        ticks.iter().take(3).map(Report::num_workers).collect_vec(),
        vec![1, 2, 4],
        "slow start doubles from nothing"
    );

    assert_settles(ticks, 0.1);
    assert!(in_band(last, 0.1), "{last:?}");
    assert_eq!(last.num_workers(), 0);
    assert_eq!(last.invocations(), calls.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn slow_start_only_grows() {
    let calls = Arc::new(AtomicU64::new(0));
    let pacer = Pacer::new(RateSpec::per_second(20)).unwrap();

    let reports = run_collecting(
        pacer,
        sleeping(Duration::from_millis(400), &calls),
        time::sleep(Duration::from_secs(15)),
    )
    .await;
    let ticks = &reports[..reports.len() - 1];

    assert!(ticks
        .iter()
        .take_while(|r| r.phase() == Phase::SlowStart)
        .tuple_windows()
        .all(|(a, b)| b.num_workers() >= a.num_workers()));
}

#[tokio::test(start_paused = true)]
async fn fast_recovery_is_permanent() {
    let calls = Arc::new(AtomicU64::new(0));
    // Tight band, so overshoot is likely.
    let pacer = Pacer::new(RateSpec::per_second(50).with_error_band(0.02)).unwrap();

    let reports = run_collecting(
        pacer,
        sleeping(Duration::from_millis(250), &calls),
        time::sleep(Duration::from_secs(20)),
    )
    .await;

    let phases = reports.iter().map(Report::phase).dedup().collect_vec();
    assert!(
        phases == vec![Phase::SlowStart, Phase::FastRecovery] || phases == vec![Phase::SlowStart],
        "{phases:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn instant_operation_needs_one_worker() {
    let calls = Arc::new(AtomicU64::new(0));
    let pacer = Pacer::new(RateSpec::per_second(10)).unwrap();

    let reports = run_collecting(
        pacer,
        sleeping(Duration::ZERO, &calls),
        time::sleep(Duration::from_secs(10)),
    )
    .await;
    let ticks = &reports[..reports.len() - 1];

    assert!(ticks.iter().all(|r| r.num_workers() == 1), "{ticks:#?}");
    assert!(ticks.iter().all(|r| r.phase() == Phase::SlowStart));
    assert!(ticks.iter().skip(1).all(|r| in_band(r, 0.1)), "{ticks:#?}");
}

#[tokio::test(start_paused = true)]
async fn zero_error_band_does_not_stall() {
    let calls = Arc::new(AtomicU64::new(0));
    let pacer = Pacer::new(RateSpec::per_second(10).with_error_band(0.0)).unwrap();

    let reports = run_collecting(
        pacer,
        sleeping(Duration::from_millis(150), &calls),
        time::sleep(Duration::from_millis(5_500)),
    )
    .await;

    assert_eq!(reports.len(), 6, "five samples and a final report");
    assert!(calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test(start_paused = true)]
async fn nothing_starts_after_cancellation() {
    let started = Arc::new(AtomicU64::new(0));
    let finished = Arc::new(AtomicU64::new(0));
    let op = {
        let started = started.clone();
        let finished = finished.clone();
        move || {
            started.fetch_add(1, Ordering::SeqCst);
            let finished = finished.clone();
            async move {
                time::sleep(Duration::from_millis(100)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            }
        }
    };

    let started_at_cancellation = Arc::new(AtomicU64::new(0));
    let cancellation = {
        let started = started.clone();
        let started_at_cancellation = started_at_cancellation.clone();
        async move {
            time::sleep(Duration::from_secs(5)).await;
            started_at_cancellation.store(started.load(Ordering::SeqCst), Ordering::SeqCst);
        }
    };

    let pacer = Pacer::new(RateSpec::per_second(40)).unwrap();
    let last = pacer.run(op, cancellation).await;

    let started_at_cancellation = started_at_cancellation.load(Ordering::SeqCst);
    assert!(started_at_cancellation > 0);
    assert_eq!(
        started.load(Ordering::SeqCst),
        started_at_cancellation,
        "no invocation starts once cancelled"
    );
    assert_eq!(
        finished.load(Ordering::SeqCst),
        started_at_cancellation,
        "invocations in flight run to completion"
    );
    assert_eq!(last.invocations(), started_at_cancellation);

    time::sleep(Duration::from_secs(10)).await;
    assert_eq!(started.load(Ordering::SeqCst), started_at_cancellation);
}

#[tokio::test(start_paused = true)]
async fn reports_are_readable_during_and_after_a_run() {
    let calls = Arc::new(AtomicU64::new(0));
    let pacer = Pacer::new(RateSpec::per_second(10)).unwrap();
    let reporter = pacer.reporter();

    let run = tokio::spawn(pacer.run(
        sleeping(Duration::from_millis(50), &calls),
        time::sleep(Duration::from_secs(5)),
    ));

    time::sleep(Duration::from_millis(2_500)).await;
    let during = reporter.snapshot();
    assert_eq!(during, reporter.snapshot(), "no tick in between");
    assert_eq!(during.num_workers(), 1);
    assert_eq!(during.target_rps(), 10.0);

    let last = run.await.unwrap();
    assert_eq!(reporter.snapshot(), last);
    assert_eq!(reporter.snapshot(), reporter.snapshot());
}

#[tokio::test(start_paused = true)]
async fn jittered_latency_converges() {
    let seed = rand::random();
    println!("Seed: {seed}");
    let rng = Arc::new(Mutex::new(SmallRng::seed_from_u64(seed)));

    // Mean latency of 200ms: 2 stages, each completing at 10/s on average.
    let latency = Erlang::new(2, 10.0).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let op = {
        let calls = calls.clone();
        move || {
            let delay = Duration::from_secs_f64(latency.sample(&mut *rng.lock().unwrap()));
            let calls = calls.clone();
            async move {
                time::sleep(delay).await;
                calls.fetch_add(1, Ordering::SeqCst);
            }
        }
    };

    let pacer = Pacer::new(RateSpec::per_second(25).with_error_band(0.2)).unwrap();
    let reports = run_collecting(pacer, op, time::sleep(Duration::from_secs(30))).await;

    assert_settles(&reports, 0.2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn blocking_operations_in_parallel() {
    let calls = Arc::new(AtomicU64::new(0));
    let op = {
        let calls = calls.clone();
        operation::blocking(move || {
            std::thread::sleep(Duration::from_millis(20));
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };

    let pacer = Pacer::new(RateSpec::per_second(100))
        .unwrap()
        .with_sample_interval(Duration::from_millis(200));

    let last = pacer.run(op, time::sleep(Duration::from_secs(2))).await;

    let at_return = calls.load(Ordering::SeqCst);
    assert!(at_return > 0);
    assert_eq!(last.invocations(), at_return);
    assert_eq!(last.num_workers(), 0);

    time::sleep(Duration::from_millis(200)).await;
    assert_eq!(calls.load(Ordering::SeqCst), at_return);
}
