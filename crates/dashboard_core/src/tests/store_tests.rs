use super::*;
use crate::{clock::ManualClock, timer::RecordingScheduler};

fn store() -> (ViewModelStore, ManualClock, RecordingScheduler) {
    let clock = ManualClock::new(1_700_000_000_000);
    let scheduler = RecordingScheduler::new();
    let store = ViewModelStore::new(Arc::new(clock.clone()), Arc::new(scheduler.clone()));
    (store, clock, scheduler)
}

#[test]
fn elapsed_timer_and_start_time_move_together() {
    let (mut store, clock, scheduler) = store();
    assert!(!store.is_elapsed_running());
    assert_eq!(store.state().printer.print_start_time(), None);

    assert!(store.start_elapsed_timer());
    assert!(store.is_elapsed_running());
    assert_eq!(
        store.state().printer.print_start_time(),
        Some(clock.now_ms())
    );
    assert_eq!(scheduler.live(TimerKind::Elapsed), 1);

    store.stop_elapsed_timer();
    assert!(!store.is_elapsed_running());
    assert_eq!(store.state().printer.print_start_time(), None);
    assert_eq!(store.state().printer.seconds_elapsed, None);
    assert_eq!(scheduler.live(TimerKind::Elapsed), 0);
}

#[test]
fn starting_twice_keeps_original_origin() {
    let (mut store, clock, scheduler) = store();
    store.start_elapsed_timer();
    let origin = store.state().printer.print_start_time();
    clock.advance_secs(30);
    assert!(!store.start_elapsed_timer());
    assert_eq!(store.state().printer.print_start_time(), origin);
    assert_eq!(scheduler.started(TimerKind::Elapsed), 1);
}

#[test]
fn elapsed_ticks_follow_the_clock() {
    let (mut store, clock, _) = store();
    store.start_elapsed_timer();
    clock.advance_secs(65);
    store.tick(TimerKind::Elapsed);
    assert_eq!(store.state().printer.seconds_elapsed, Some(65));

    clock.advance_secs(1);
    store.tick(TimerKind::Elapsed);
    assert_eq!(store.state().printer.seconds_elapsed, Some(66));
}

#[test]
fn tick_without_running_timer_leaves_placeholder() {
    let (mut store, clock, _) = store();
    clock.advance_secs(10);
    store.tick(TimerKind::Elapsed);
    assert_eq!(store.state().printer.seconds_elapsed, None);
}

#[test]
fn operation_timer_restarts_on_new_origin_only() {
    let (mut store, clock, scheduler) = store();
    let origin = clock.now_ms() - 5_000;
    store.start_operation_timer(origin);
    assert_eq!(store.state().operation.duration_secs, Some(5));

    store.start_operation_timer(origin);
    assert_eq!(scheduler.started(TimerKind::OperationDuration), 1);

    store.start_operation_timer(clock.now_ms());
    assert_eq!(scheduler.started(TimerKind::OperationDuration), 2);
    assert_eq!(scheduler.live(TimerKind::OperationDuration), 1);
    assert_eq!(scheduler.live(TimerKind::Elapsed), 0);

    clock.advance_secs(3);
    store.tick(TimerKind::OperationDuration);
    assert_eq!(store.state().operation.duration_secs, Some(3));

    store.stop_operation_timer();
    assert!(!store.is_operation_running());
    assert_eq!(store.state().operation.duration_secs, Some(3));
}

#[test]
fn notices_are_bounded() {
    let (mut store, _, _) = store();
    for idx in 0..(MAX_NOTICES + 5) {
        store.push_notice(AlertLevel::Info, format!("notice {idx}"));
    }
    assert_eq!(store.state().notices.len(), MAX_NOTICES);
    assert_eq!(store.state().notices.front().unwrap().message, "notice 5");
}
