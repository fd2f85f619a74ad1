//! Property tests for sample delivery.
//!
//! For any interleaving of start, stop, pushes, late pushes from dead
//! subscriptions and elapsed time, the listener only ever hears samples
//! while the tracker is active and never between `stop()` and the next
//! `start()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use tokio::sync::watch;

use geotrack::simulation::{ScriptedPermissions, ScriptedSettings, SimulatedProvider};
use geotrack::tracking::{
    LocationSample, LocationTracker, PositionFix, ProviderEvent, TrackerCollaborators,
    TrackingConfig, TrackingState,
};

#[derive(Debug, Clone)]
enum Op {
    Start,
    Stop,
    Push(usize),
    LatePush,
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Stop),
        (1usize..4).prop_map(Op::Push),
        Just(Op::LatePush),
        (0u64..25).prop_map(Op::Advance),
    ]
}

/// Records any delivery that happens in the wrong state.
struct Auditor {
    state: watch::Receiver<TrackingState>,
    stopped: Arc<AtomicBool>,
    violations: Arc<Mutex<Vec<String>>>,
    delivered: Arc<Mutex<usize>>,
}

impl Auditor {
    fn check(&self, sample: &LocationSample) {
        *self.delivered.lock() += 1;
        let state = *self.state.borrow();
        if state != TrackingState::Active {
            self.violations
                .lock()
                .push(format!("{} sample delivered in {state}", sample.source));
        }
        if self.stopped.load(Ordering::SeqCst) {
            self.violations
                .lock()
                .push(format!("{} sample delivered after stop", sample.source));
        }
    }
}

/// A tracker with an [`Auditor`] registered as its listener.
struct Audit {
    tracker: LocationTracker,
    stopped: Arc<AtomicBool>,
    violations: Arc<Mutex<Vec<String>>>,
    delivered: Arc<Mutex<usize>>,
}

impl Audit {
    fn attach(provider: Arc<SimulatedProvider>, config: TrackingConfig) -> Self {
        let tracker = LocationTracker::new(
            config,
            TrackerCollaborators {
                permissions: Arc::new(ScriptedPermissions::granted()),
                settings: Arc::new(ScriptedSettings::satisfied()),
                provider,
            },
        )
        .unwrap();

        let stopped = Arc::new(AtomicBool::new(false));
        let violations = Arc::new(Mutex::new(Vec::new()));
        let delivered = Arc::new(Mutex::new(0));
        let auditor = Auditor {
            state: tracker.subscribe_state(),
            stopped: stopped.clone(),
            violations: violations.clone(),
            delivered: delivered.clone(),
        };
        tracker.register(move |sample: &LocationSample| auditor.check(sample));

        Self {
            tracker,
            stopped,
            violations,
            delivered,
        }
    }
}

fn run_ops(ops: &[Op]) -> (Vec<String>, usize) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async {
        let provider = Arc::new(SimulatedProvider::new());
        provider.set_last_known(Some(PositionFix::new(48.1, 11.6, 8.0)));

        let audit = Audit::attach(provider.clone(), TrackingConfig::default());
        let Audit {
            tracker,
            stopped,
            violations,
            delivered,
        } = audit;

        let settle = || tokio::time::sleep(Duration::from_millis(1));
        let mut latitude = 0.0;

        for op in ops {
            match op {
                Op::Start => {
                    stopped.store(false, Ordering::SeqCst);
                    tracker.start();
                    settle().await;
                }
                Op::Stop => {
                    tracker.stop();
                    stopped.store(true, Ordering::SeqCst);
                }
                Op::Push(count) => {
                    let fixes = (0..*count)
                        .map(|_| {
                            latitude += 0.001;
                            PositionFix::new(latitude, 11.6, 5.0)
                        })
                        .collect();
                    provider.push(fixes);
                    settle().await;
                }
                Op::LatePush => {
                    if let Some(sink) = provider.last_sink() {
                        let _ = sink.send(ProviderEvent::Locations(vec![PositionFix::new(
                            -1.0, -1.0, 50.0,
                        )]));
                    }
                    settle().await;
                }
                Op::Advance(secs) => {
                    tokio::time::sleep(Duration::from_secs(*secs)).await;
                }
            }
        }

        tracker.stop();
        let result = (violations.lock().clone(), *delivered.lock());
        result
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_no_delivery_outside_active(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let (violations, _) = run_ops(&ops);
        prop_assert!(violations.is_empty(), "violations: {:?}", violations);
    }
}

#[test]
fn test_active_session_delivers() {
    let (violations, delivered) = run_ops(&[
        Op::Start,
        Op::Push(3),
        Op::Advance(10),
        Op::Stop,
        Op::LatePush,
        Op::Advance(30),
    ]);

    assert!(violations.is_empty(), "violations: {violations:?}");
    assert_eq!(delivered, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_races_pushes_from_provider_threads() {
    let mut total = 0;

    for round in 0..50 {
        let provider = Arc::new(SimulatedProvider::new());
        provider.set_last_known(Some(PositionFix::new(35.7, 139.7, 6.0)));
        let audit = Audit::attach(
            provider.clone(),
            TrackingConfig::new(Duration::from_millis(1)).with_min_distance(0.0),
        );

        audit.tracker.start();
        let mut state = audit.tracker.subscribe_state();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == TrackingState::Active),
        )
        .await
        .expect("tracker never became active")
        .unwrap();

        // Provider threads keep pushing across the stop.
        let pushing = Arc::new(AtomicBool::new(true));
        let threads: Vec<_> = (0..2)
            .map(|t| {
                let provider = provider.clone();
                let pushing = pushing.clone();
                std::thread::spawn(move || {
                    let mut n = 0.0;
                    while pushing.load(Ordering::SeqCst) {
                        n += 0.0001;
                        provider.push(vec![PositionFix::new(35.7 + n, 139.7 + t as f64, 5.0)]);
                        std::thread::yield_now();
                    }
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(2 + round % 3)).await;
        audit.tracker.stop();
        audit.stopped.store(true, Ordering::SeqCst);

        // Let queued batches and in-flight polls reach the sink.
        tokio::time::sleep(Duration::from_millis(5)).await;
        pushing.store(false, Ordering::SeqCst);
        for thread in threads {
            thread.join().unwrap();
        }
        tokio::time::sleep(Duration::from_millis(2)).await;

        let violations = audit.violations.lock().clone();
        assert!(violations.is_empty(), "round {round}: {violations:?}");
        total += *audit.delivered.lock();
    }

    assert!(total > 0, "no samples delivered in any round");
}
