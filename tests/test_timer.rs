use std::time::{Duration, Instant};

use rampart::timer::TimerList;

#[test]
fn test_tick_evicts_in_deadline_order() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    // Inserted out of order on purpose.
    timers.add(base + Duration::from_secs(3), 30);
    timers.add(base + Duration::from_secs(1), 10);
    timers.add(base + Duration::from_secs(2), 20);

    let mut evicted = Vec::new();
    timers.tick(base + Duration::from_millis(2500), |token| evicted.push(token));

    assert_eq!(evicted, vec![10, 20]);
    assert_eq!(timers.len(), 1);
    assert_eq!(timers.tokens(), vec![30]);
}

#[test]
fn test_tick_with_nothing_due_is_a_noop() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    timers.add(base + Duration::from_secs(5), 1);

    let mut evicted = Vec::new();
    timers.tick(base, |token| evicted.push(token));

    assert!(evicted.is_empty());
    assert_eq!(timers.len(), 1);
}

#[test]
fn test_adjust_resorts_the_list() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    let first = timers.add(base + Duration::from_secs(1), 10);
    timers.add(base + Duration::from_secs(2), 20);

    // Push the earliest deadline past the other entry.
    assert!(timers.adjust(first, base + Duration::from_secs(3)));

    let mut evicted = Vec::new();
    timers.tick(base + Duration::from_secs(10), |token| evicted.push(token));
    assert_eq!(evicted, vec![20, 10]);
}

#[test]
fn test_adjust_rejects_an_earlier_deadline() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    let handle = timers.add(base + Duration::from_secs(5), 1);

    assert!(!timers.adjust(handle, base + Duration::from_secs(1)));

    // The original deadline still stands.
    let mut evicted = Vec::new();
    timers.tick(base + Duration::from_secs(2), |token| evicted.push(token));
    assert!(evicted.is_empty());
}

#[test]
fn test_remove_head_middle_and_tail() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    let a = timers.add(base + Duration::from_secs(1), 1);
    let b = timers.add(base + Duration::from_secs(2), 2);
    let c = timers.add(base + Duration::from_secs(3), 3);
    let d = timers.add(base + Duration::from_secs(4), 4);

    assert!(timers.remove(a)); // head
    assert!(timers.remove(c)); // middle
    assert!(timers.remove(d)); // tail
    assert_eq!(timers.tokens(), vec![2]);

    let mut evicted = Vec::new();
    timers.tick(base + Duration::from_secs(10), |token| evicted.push(token));
    assert_eq!(evicted, vec![2]);
    assert!(timers.is_empty());
    let _ = b;
}

#[test]
fn test_stale_handle_is_rejected_after_slot_reuse() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    let stale = timers.add(base + Duration::from_secs(1), 1);
    assert!(timers.remove(stale));

    // The freed slot gets reused for a new entry; the old handle must not
    // be able to touch it.
    let fresh = timers.add(base + Duration::from_secs(2), 2);
    assert!(!timers.remove(stale));
    assert!(!timers.adjust(stale, base + Duration::from_secs(9)));
    assert_eq!(timers.tokens(), vec![2]);

    assert!(timers.remove(fresh));
    assert!(timers.is_empty());
}

#[test]
fn test_eviction_invalidates_handles() {
    let base = Instant::now();
    let mut timers = TimerList::new();
    let handle = timers.add(base + Duration::from_secs(1), 7);

    let mut evicted = Vec::new();
    timers.tick(base + Duration::from_secs(2), |token| evicted.push(token));
    assert_eq!(evicted, vec![7]);

    assert!(!timers.remove(handle));
    assert!(!timers.adjust(handle, base + Duration::from_secs(30)));
}
