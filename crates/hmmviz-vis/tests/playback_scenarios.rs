//! End-to-end playback scenarios driven through the public `Diagram` handle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hmmviz_vis::{
    Diagram, DiagramSettings, EdgeKind, ErrorKind, ManualClock, Matrix, PlaybackState,
    Snapshot, Surface,
};
use proptest::prelude::*;

const FRAME: Duration = Duration::from_millis(16);

fn diagram() -> Diagram {
    Diagram::new(Surface::default(), DiagramSettings::default()).unwrap()
}

fn weather(iteration: u64) -> Snapshot {
    Snapshot::from_transition(
        iteration,
        Matrix::from_rows(vec![vec![0.7, 0.3], vec![0.4, 0.6]]).unwrap(),
    )
}

fn run(len: u64) -> Vec<Snapshot> {
    (1..=len).map(weather).collect()
}

#[test]
fn ten_fed_iterations_complete_once_at_the_last_index() {
    let d = diagram();
    for i in 1..=10 {
        d.feed_iteration(weather(i)).unwrap();
    }
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    d.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    d.play();
    let mut clock = ManualClock::new(&d, FRAME);
    assert!(clock.run_until(100_000, || d.state() == PlaybackState::Complete));
    clock.advance(500);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(d.current_index(), 9);
}

#[test]
fn negative_speed_is_rejected_without_side_effects() {
    let d = diagram();
    d.load(run(4)).unwrap();
    d.seek_to(2).unwrap();
    let before = d.playback();

    let err = d.set_speed(-1.0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let after = d.playback();
    assert_eq!(after.current_index, before.current_index);
    assert_eq!(after.state, before.state);
    assert_eq!(after.speed, before.speed);
    assert_eq!(d.len(), 4);
}

#[test]
fn playback_advances_exactly_len_minus_one_times() {
    let d = diagram();
    d.load(run(6)).unwrap();
    let mut indices = vec![d.current_index()];
    d.play();

    let mut clock = ManualClock::new(&d, FRAME);
    let mut advanced = 0;
    for _ in 0..10_000 {
        clock.tick();
        let index = d.current_index();
        if indices.last() != Some(&index) {
            indices.push(index);
            advanced += 1;
        }
        if d.state() == PlaybackState::Complete {
            break;
        }
    }
    assert_eq!(d.state(), PlaybackState::Complete);
    assert_eq!(advanced, 5);
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn pause_discards_pending_progress() {
    let d = diagram();
    d.load(run(3)).unwrap();
    d.play();
    // Just short of one iteration interval at the default 600ms.
    d.tick(Duration::from_millis(590));
    d.pause();
    d.play();
    d.tick(Duration::from_millis(20));
    assert_eq!(d.current_index(), 0);
}

#[test]
fn faster_speed_reaches_completion_sooner() {
    let ticks_to_complete = |speed: f64| {
        let d = diagram();
        d.load(run(5)).unwrap();
        d.set_speed(speed).unwrap();
        d.play();
        let mut clock = ManualClock::new(&d, FRAME);
        let mut ticks = 0;
        while d.state() != PlaybackState::Complete && ticks < 100_000 {
            clock.tick();
            ticks += 1;
        }
        ticks
    };
    assert!(ticks_to_complete(4.0) < ticks_to_complete(1.0));
}

#[test]
fn feeding_after_completion_produces_a_second_completion() {
    let d = diagram();
    d.load(run(2)).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    d.on_complete(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    d.play();
    d.tick(Duration::from_secs(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    d.feed_iteration(weather(3)).unwrap();
    d.tick(Duration::from_secs(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(d.current_index(), 2);
}

#[test]
fn identity_matrix_draws_only_self_loops() {
    let d = diagram();
    d.load(vec![Snapshot::from_transition(1, Matrix::identity(3))])
        .unwrap();
    for _ in 0..2 {
        let edges = d.visible_edges();
        assert_eq!(edges.len(), 3);
        assert!(edges
            .iter()
            .all(|e| e.is_self_loop() && e.kind == EdgeKind::Transition));
        d.toggle_decongestion();
    }
}

#[test]
fn empty_diagram_ignores_playback_but_rejects_seek() {
    let d = diagram();
    d.play();
    d.go_first();
    d.go_last();
    d.step_forward();
    d.tick(Duration::from_secs(1));
    assert_eq!(d.state(), PlaybackState::Empty);
    assert_eq!(d.seek_to(0).unwrap_err().kind(), ErrorKind::Range);
}

proptest! {
    #[test]
    fn seek_reads_back_and_clears_particles(len in 1u64..20, target in 0usize..25) {
        let d = diagram();
        d.load(run(len)).unwrap();
        d.tick(FRAME);
        let before = d.current_index();

        match d.seek_to(target) {
            Ok(()) => {
                prop_assert!(target < len as usize);
                prop_assert_eq!(d.current_index(), target);
                prop_assert_eq!(d.current_snapshot().unwrap().iteration, target as u64 + 1);
                prop_assert_eq!(d.particle_count(), 0);
            }
            Err(e) => {
                prop_assert!(target >= len as usize);
                prop_assert_eq!(e.kind(), ErrorKind::Range);
                prop_assert_eq!(d.current_index(), before);
            }
        }
    }

    #[test]
    fn buffer_length_counts_accepted_feeds(steps in prop::collection::vec(0u64..4, 1..30)) {
        let d = diagram();
        let mut last = 0u64;
        let mut accepted = 0usize;
        for step in steps {
            let iteration = last + step;
            match d.feed_iteration(weather(iteration)) {
                Ok(()) => {
                    last = iteration;
                    accepted += 1;
                }
                Err(e) => prop_assert_eq!(e.kind(), ErrorKind::Validation),
            }
            prop_assert_eq!(d.len(), accepted);
        }
    }
}
