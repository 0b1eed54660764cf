use std::sync::mpsc::Receiver;
use std::sync::Arc;

use super::*;
use crate::models::SocialCounts;
use crate::store::memory::fixtures::{author, event_id, note, reaction, reply};
use crate::store::MemoryGateway;

fn window_with(store: &Arc<MemoryGateway>, config: WindowConfig, query: WindowQuery) -> (EventWindow<MemoryGateway>, Receiver<WindowEvent>) {
    let mut window = EventWindow::with_query(store.clone(), config, query);
    let rx = window.take_events().unwrap();
    (window, rx)
}

fn timeline(store: &Arc<MemoryGateway>) -> (EventWindow<MemoryGateway>, Receiver<WindowEvent>) {
    window_with(store, WindowConfig::default(), WindowQuery::global())
}

fn drain(rx: &Receiver<WindowEvent>) -> Vec<WindowEvent> {
    rx.try_iter().collect()
}

fn list_changes(events: &[WindowEvent]) -> Vec<ListChange> {
    events
        .iter()
        .filter_map(|e| match e {
            WindowEvent::ItemsChanged(change) => Some(*change),
            _ => None,
        })
        .collect()
}

fn times(window: &EventWindow<MemoryGateway>) -> Vec<u64> {
    window
        .keys()
        .iter()
        .map(|k| window.entry(*k).unwrap().created_at())
        .collect()
}

fn assert_sorted_desc(window: &EventWindow<MemoryGateway>) {
    let times = times(window);
    for pair in times.windows(2) {
        assert!(pair[0] >= pair[1], "not newest first: {:?}", times);
    }
}

fn assert_no_duplicates(window: &EventWindow<MemoryGateway>) {
    let mut seen = std::collections::HashSet::new();
    for key in window.keys().iter().copied().chain(window.pending_keys()) {
        assert!(seen.insert(key), "duplicate identity {}", key);
    }
}

#[test]
fn test_thirty_event_scenario() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..30 {
        store.insert(note(i, 10_000 - i));
    }
    let (mut window, rx) = timeline(&store);

    window.refresh().unwrap();
    let cap = window.config().cap_for(window.query().limit);
    assert_eq!(window.len(), 30.min(cap));
    assert_sorted_desc(&window);
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::insert(0, 30)]);

    let oldest = window.oldest_timestamp();
    assert_eq!(window.trim_newer(5), 25);
    assert_eq!(window.len(), 5);
    assert_eq!(window.oldest_timestamp(), oldest);
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::remove(0, 25)]);

    window.clear();
    assert_eq!(window.len(), 0);
    assert_eq!(window.oldest_timestamp(), 0);
    assert_eq!(window.newest_timestamp(), 0);
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::remove(0, 5)]);
    assert_eq!(store.open_transactions(), 0);
}

#[test]
fn test_trim_older_keeps_newest() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..20 {
        store.insert(note(i, 500 + i));
    }
    let (mut window, rx) = timeline(&store);
    window.refresh().unwrap();
    drain(&rx);

    let newest = window.newest_timestamp();
    assert_eq!(window.trim_older(8), 12);
    assert_eq!(window.len(), 8);
    assert_eq!(window.newest_timestamp(), newest);
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::remove(8, 12)]);

    // Keeping more than there is does nothing
    assert_eq!(window.trim_older(50), 0);
    assert_eq!(window.trim_newer(50), 0);
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_idempotent_refresh() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..12 {
        store.insert(note(i, 100 + (i * 7) % 5));
    }
    let (mut window, rx) = timeline(&store);

    assert_eq!(window.refresh().unwrap(), 12);
    let keys = window.keys().to_vec();
    drain(&rx);

    assert_eq!(window.refresh().unwrap(), 0);
    assert_eq!(window.keys(), keys.as_slice());
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_sort_and_dedup_across_pulls_and_pushes() {
    let store = Arc::new(MemoryGateway::new());
    for (seed, ts) in [(1, 50), (2, 10), (3, 30), (4, 30), (5, 70)] {
        store.insert(note(seed, ts));
    }
    let (mut window, _rx) = timeline(&store);
    window.refresh().unwrap();
    assert_sorted_desc(&window);

    // Anchored live arrivals, including one already present
    let k6 = store.insert(note(6, 40));
    let k7 = store.insert(note(7, 80));
    let existing = window.item_at(0).unwrap();
    window.push_live_batch(&[k6, existing, k7, k6]);
    assert_eq!(window.len(), 7);
    assert_sorted_desc(&window);
    assert_no_duplicates(&window);

    // Pending arrivals while scrolled away
    window.set_anchored(false);
    let k8 = store.insert(note(8, 90));
    window.push_live(k8);
    window.push_live(k8);
    window.push_live(k7);
    assert_eq!(window.pending_count(), 1);
    assert_no_duplicates(&window);

    window.refresh().unwrap();
    assert_no_duplicates(&window);
    assert_sorted_desc(&window);
}

#[test]
fn test_pending_scenario() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..5 {
        store.insert(note(i, 100 + i));
    }
    let (mut window, rx) = timeline(&store);
    window.refresh().unwrap();
    window.set_anchored(false);
    drain(&rx);

    let before = window.len();
    for i in 10..13 {
        let key = store.insert(note(i, 200 + i));
        window.push_live(key);
    }
    assert_eq!(window.pending_count(), 3);
    assert_eq!(window.len(), before);
    let events = drain(&rx);
    assert!(list_changes(&events).is_empty());
    assert_eq!(events.last(), Some(&WindowEvent::PendingChanged { count: 3 }));

    assert_eq!(window.flush_pending(), 3);
    assert_eq!(window.len(), before + 3);
    assert_eq!(window.pending_count(), 0);
    assert_sorted_desc(&window);

    // One aggregate notification for the whole flush
    let events = drain(&rx);
    assert_eq!(
        list_changes(&events),
        vec![ListChange { start: 0, removed: before, added: before + 3 }]
    );
    assert!(events.contains(&WindowEvent::PendingChanged { count: 0 }));

    // Flushed entries reveal
    let top = window.entry_at(0).unwrap();
    assert!(top.annotations().revealing);
}

#[test]
fn test_anchoring_flushes_pending() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, _rx) = timeline(&store);
    window.set_anchored(false);
    let key = store.insert(note(1, 10));
    window.push_live(key);
    assert_eq!(window.len(), 0);

    window.set_anchored(true);
    assert_eq!(window.len(), 1);
    assert_eq!(window.pending_count(), 0);
}

#[test]
fn test_pending_buffer_drops_earliest() {
    let store = Arc::new(MemoryGateway::new());
    let config = WindowConfig { pending_max: 3, ..Default::default() };
    let (mut window, _rx) = window_with(&store, config, WindowQuery::global());
    window.set_anchored(false);

    let keys: Vec<RecordKey> = (0..5).map(|i| store.insert(note(i, 100 + i))).collect();
    for key in &keys {
        window.push_live(*key);
    }
    assert_eq!(window.pending_count(), 3);
    let pending: Vec<RecordKey> = window.pending_keys().collect();
    assert_eq!(pending, keys[2..].to_vec());
    assert!(!window.contains(keys[0]));
}

#[test]
fn test_window_cap_applies_to_refresh_and_live() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..20 {
        store.insert(note(i, 1000 + i));
    }
    let config = WindowConfig { max_items: 10, ..Default::default() };
    let (mut window, rx) = window_with(&store, config, WindowQuery::global());

    window.refresh().unwrap();
    assert_eq!(window.len(), 10);
    assert_eq!(window.newest_timestamp(), 1019);
    drain(&rx);

    let key = store.insert(note(99, 2000));
    window.push_live(key);
    assert_eq!(window.len(), 10);
    assert_eq!(window.item_at(0), Some(key));
    assert_eq!(
        list_changes(&drain(&rx)),
        vec![ListChange::insert(0, 1), ListChange::remove(10, 1)]
    );

    // The query limit caps too
    let (mut small, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_limit(4));
    small.refresh().unwrap();
    assert_eq!(small.len(), 4);
}

#[test]
fn test_failed_refresh_leaves_window_unchanged() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..3 {
        store.insert(note(i, 10 + i));
    }
    let (mut window, rx) = timeline(&store);
    window.refresh().unwrap();
    let keys = window.keys().to_vec();
    drain(&rx);

    store.insert(note(50, 99));
    store.set_busy(true);
    assert_eq!(window.refresh(), Err(WindowError::QueryFailed(StoreError::Busy)));
    assert_eq!(window.keys(), keys.as_slice());
    assert!(drain(&rx).is_empty());

    store.set_busy(false);
    assert_eq!(window.refresh().unwrap(), 1);
}

#[test]
fn test_busy_live_batch_is_parked() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, _rx) = timeline(&store);
    let first = store.insert(note(1, 10));
    let second = store.insert(note(2, 20));

    store.set_busy(true);
    window.push_live(first);
    assert_eq!(window.len(), 0);
    assert_eq!(window.parked_count(), 1);

    store.set_busy(false);
    window.push_live(second);
    assert_eq!(window.parked_count(), 0);
    assert_eq!(window.keys(), &[second, first]);
}

#[test]
fn test_parked_keys_retried_on_refresh() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_kinds([1]));
    let key = store.insert(note(1, 10));
    store.set_busy(true);
    window.push_live(key);
    store.set_busy(false);

    window.refresh().unwrap();
    assert_eq!(window.parked_count(), 0);
    assert_eq!(window.keys(), &[key]);
}

#[test]
fn test_live_arrivals_are_filtered() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, _rx) = timeline(&store);

    let target = note(1, 10);
    let like = store.insert(reaction(2, target.id));
    window.push_live(like);
    assert_eq!(window.len(), 0);

    let mut expired = note(3, 20);
    expired.tags.push(vec!["expiration".into(), "1".into()]);
    let expired = store.insert(expired);
    window.push_live(expired);
    assert_eq!(window.len(), 0);

    let mut other_author = note(4, 30);
    other_author.pubkey = author(0x01);
    let other_author = store.insert(other_author);
    let (mut mine, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::for_author(author(0xaa)));
    mine.push_live(other_author);
    assert_eq!(mine.len(), 0);
}

#[test]
fn test_live_insert_outside_visible_range_skips_animation() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..10 {
        store.insert(note(i, 100 + i));
    }
    let (mut window, _rx) = timeline(&store);
    window.refresh().unwrap();

    window.set_visible_range(4, 8);
    let newest = store.insert(note(50, 500));
    window.push_live(newest);
    assert!(window.entry(newest).unwrap().annotations().skip_animation);

    window.set_visible_range(0, 8);
    let next = store.insert(note(51, 600));
    window.push_live(next);
    assert!(!window.entry(next).unwrap().annotations().skip_animation);
}

#[test]
fn test_thread_ordering_and_depth() {
    let store = Arc::new(MemoryGateway::new());
    let root = event_id(1);
    let a = event_id(2);
    store.insert(note(1, 100));
    let key_a = store.insert(reply(2, 110, root, root));
    let key_b = store.insert(reply(3, 130, root, root));
    let key_a1 = store.insert(reply(4, 120, root, a));
    store.insert(note(9, 115)); // not part of the thread

    let (mut window, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::thread(root));
    window.refresh().unwrap();

    let root_key = store.key_for(&root).unwrap();
    assert_eq!(window.keys(), &[root_key, key_a, key_a1, key_b]);
    let depths: Vec<u32> = window
        .keys()
        .iter()
        .map(|k| window.thread_info(*k).unwrap().depth)
        .collect();
    assert_eq!(depths, vec![0, 1, 2, 1]);
    assert!(window.thread_info(root_key).unwrap().is_root());
    assert_eq!(window.thread_info(key_a1).unwrap().parent, Some(a));

    // Thread views never defer, even when not anchored
    window.set_anchored(false);
    let key_a2 = store.insert(reply(5, 125, root, a));
    window.push_live(key_a2);
    assert_eq!(window.pending_count(), 0);
    assert_eq!(window.keys(), &[root_key, key_a, key_a1, key_a2, key_b]);

    // A reply whose parent is not in the window goes to the tail at depth 1
    let orphan = store.insert(reply(6, 105, root, event_id(77)));
    window.push_live(orphan);
    assert_eq!(window.keys().last(), Some(&orphan));
    assert_eq!(window.thread_info(orphan).unwrap().depth, 1);
}

#[test]
fn test_thread_depth_is_capped() {
    let store = Arc::new(MemoryGateway::new());
    let root = event_id(0);
    store.insert(note(0, 1));
    let mut parent = root;
    for i in 1..15 {
        store.insert(reply(i, 1 + i, root, parent));
        parent = event_id(i);
    }
    let (mut window, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::thread(root));
    window.refresh().unwrap();
    assert_eq!(window.len(), 15);
    let max_depth = window
        .keys()
        .iter()
        .filter_map(|k| window.thread_info(*k))
        .map(|t| t.depth)
        .max();
    assert_eq!(max_depth, Some(10));
}

#[test]
fn test_set_query_clears_without_pulling() {
    let store = Arc::new(MemoryGateway::new());
    store.insert(note(1, 10));
    let (mut window, rx) = timeline(&store);
    window.refresh().unwrap();
    drain(&rx);

    let opened = store.transactions_opened();
    window.set_query(WindowQuery::global());
    assert_eq!(window.len(), 1);

    window.set_query(WindowQuery::for_author(author(0x01)));
    assert_eq!(window.len(), 0);
    assert_eq!(store.transactions_opened(), opened);
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::remove(0, 1)]);
}

#[test]
fn test_clear_on_empty_window_emits_nothing() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, rx) = timeline(&store);
    window.clear();
    assert!(drain(&rx).is_empty());
}

#[test]
fn test_load_older_and_newer() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..30 {
        store.insert(note(i, 1000 + i));
    }
    let (mut window, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_limit(10));
    window.refresh().unwrap();
    assert_eq!(window.oldest_timestamp(), 1020);

    assert_eq!(window.load_older(5).unwrap(), 5);
    assert_eq!(window.len(), 15);
    assert_eq!(window.oldest_timestamp(), 1015);
    assert_sorted_desc(&window);

    for i in 0..4 {
        store.insert(note(100 + i, 2000 + i));
    }
    assert_eq!(window.load_newer(2).unwrap(), 2);
    assert_eq!(window.newest_timestamp(), 2001);
    assert_sorted_desc(&window);
}

#[test]
fn test_remove_from_sequence_and_pending() {
    let store = Arc::new(MemoryGateway::new());
    let a = store.insert(note(1, 10));
    let b = store.insert(note(2, 20));
    let (mut window, rx) = timeline(&store);
    window.refresh().unwrap();
    drain(&rx);

    assert!(window.remove(a));
    assert_eq!(list_changes(&drain(&rx)), vec![ListChange::remove(1, 1)]);
    assert!(!window.remove(a));

    window.set_anchored(false);
    let c = store.insert(note(3, 30));
    window.push_live(c);
    assert!(window.remove(c));
    assert_eq!(window.pending_count(), 0);
    assert_eq!(window.keys(), &[b]);
}

#[test]
fn test_annotations_and_payload_events() {
    let store = Arc::new(MemoryGateway::new());
    let target = note(1, 10);
    let target_id = target.id;
    let key = store.insert(target);
    store.insert(reaction(2, target_id));
    store.insert(reaction(3, target_id));
    let (mut window, rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_kinds([1]));
    window.refresh().unwrap();
    drain(&rx);

    // Timeline pulls are lazy
    assert!(!window.entry(key).unwrap().is_loaded());
    assert_eq!(window.refresh_counts().unwrap(), 0);

    assert_eq!(window.load_payload(key), Some(LoadOutcome::Loaded));
    assert_eq!(window.load_payload(key), Some(LoadOutcome::AlreadyLoaded));
    assert_eq!(
        drain(&rx),
        vec![WindowEvent::EntryChanged { key, change: EntryChange::PayloadLoaded }]
    );

    assert_eq!(window.refresh_counts().unwrap(), 1);
    assert_eq!(window.entry(key).unwrap().annotations().counts.likes, 2);
    assert_eq!(window.refresh_counts().unwrap(), 0);

    assert!(window.annotate(key, Annotation::Liked(true)));
    assert!(!window.annotate(key, Annotation::Liked(true)));
    assert!(window.annotate_event(&target_id, Annotation::Muted(true)));

    let profile = Arc::new(AuthorProfile { name: Some("carol".into()), ..Default::default() });
    assert_eq!(window.apply_profile(&author(0xaa), profile), 1);

    let events = drain(&rx);
    assert!(events.iter().all(|e| matches!(e, WindowEvent::EntryChanged { .. })));
    assert!(events.contains(&WindowEvent::EntryChanged {
        key,
        change: EntryChange::Annotated(Annotation::Counts(SocialCounts { likes: 2, ..Default::default() })),
    }));
    assert_eq!(store.open_transactions(), 0);
}

#[test]
fn test_resolve_profile_from_store() {
    let store = Arc::new(MemoryGateway::new());
    store.set_profile(author(0xaa), AuthorProfile { display_name: Some("Dee".into()), ..Default::default() });
    let key = store.insert(note(1, 10));
    let (mut window, _rx) = timeline(&store);
    window.refresh().unwrap();

    assert_eq!(window.resolve_profile(key), Ok(false));
    window.load_payload(key);
    assert_eq!(window.resolve_profile(key), Ok(true));
    let profile = window.entry(key).unwrap().annotations().profile.clone().unwrap();
    assert_eq!(profile.label(), Some("Dee"));
}

fn expiring_note(seed: u64, created_at: u64, expires_at: u64) -> RawRecord {
    let mut record = note(seed, created_at);
    record.tags.push(vec!["expiration".into(), expires_at.to_string()]);
    record
}

#[test]
fn test_expired_pulled_note_is_evicted_on_load() {
    let store = Arc::new(MemoryGateway::new());
    let expired = store.insert(expiring_note(1, 20, 1));
    let live = store.insert(note(2, 10));
    let (mut window, rx) = timeline(&store);

    window.refresh().unwrap();
    assert_eq!(window.keys(), &[expired, live]);
    drain(&rx);

    assert_eq!(window.load_payload(expired), None);
    assert_eq!(window.keys(), &[live]);
    assert!(!window.contains(expired));
    assert_eq!(drain(&rx), vec![WindowEvent::ItemsChanged(ListChange::remove(0, 1))]);

    assert_eq!(window.load_payload(live), Some(LoadOutcome::Loaded));
    assert_eq!(window.keys(), &[live]);

    // Same record pushed live never gets in
    let (mut other, _rx) = timeline(&store);
    other.push_live(expired);
    assert!(other.is_empty());
}

#[test]
fn test_flush_over_cap_is_one_change() {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..5 {
        store.insert(note(i, 100 + i));
    }
    let config = WindowConfig { max_items: 5, ..Default::default() };
    let (mut window, rx) = window_with(&store, config, WindowQuery::global());
    window.refresh().unwrap();
    let old_keys = window.keys().to_vec();
    window.set_anchored(false);

    let fresh: Vec<RecordKey> = (10..13).map(|i| store.insert(note(i, 200 + i))).collect();
    for key in &fresh {
        window.push_live(*key);
    }
    drain(&rx);

    assert_eq!(window.flush_pending(), 3);
    assert_eq!(window.len(), 5);
    assert_eq!(window.newest_timestamp(), 212);
    assert_sorted_desc(&window);
    for key in &old_keys[2..] {
        assert!(!window.contains(*key));
    }

    let events = drain(&rx);
    assert_eq!(
        list_changes(&events),
        vec![ListChange { start: 0, removed: 5, added: 5 }]
    );
    assert!(events.contains(&WindowEvent::PendingChanged { count: 0 }));

    // Pending entries older than a full window fall off without a list change
    let stale = store.insert(note(20, 50));
    window.push_live(stale);
    drain(&rx);
    assert_eq!(window.flush_pending(), 1);
    assert_eq!(window.len(), 5);
    assert!(!window.contains(stale));
    assert!(list_changes(&drain(&rx)).is_empty());
}

#[test]
fn test_failed_refresh_keeps_parked_keys() {
    let store = Arc::new(MemoryGateway::new());
    let (mut window, rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_kinds([1]));
    let key = store.insert(note(1, 10));
    store.set_busy(true);
    window.push_live(key);
    store.set_busy(false);
    drain(&rx);

    store.set_failing_queries(true);
    let result = window.refresh();
    assert!(matches!(result, Err(WindowError::QueryFailed(StoreError::Backend { .. }))));
    assert!(window.is_empty());
    assert_eq!(window.parked_count(), 1);
    assert!(drain(&rx).is_empty());
    assert_eq!(store.open_transactions(), 0);

    store.set_failing_queries(false);
    window.refresh().unwrap();
    assert_eq!(window.keys(), &[key]);
    assert_eq!(window.parked_count(), 0);
}

#[test]
fn test_load_older_keeps_notes_sharing_oldest_timestamp() {
    let store = Arc::new(MemoryGateway::new());
    let mut stored = Vec::new();
    for i in 0..2 {
        stored.push(store.insert(note(i, 300)));
    }
    for i in 10..14 {
        stored.push(store.insert(note(i, 200)));
    }
    let (mut window, _rx) = window_with(&store, WindowConfig::default(), WindowQuery::global().with_limit(3));
    window.refresh().unwrap();
    assert_eq!(window.len(), 3);
    assert_eq!(window.oldest_timestamp(), 200);

    assert_eq!(window.load_older(5).unwrap(), 3);
    assert_eq!(window.len(), 6);
    for key in &stored {
        assert!(window.contains(*key));
    }
    assert_no_duplicates(&window);
    assert_sorted_desc(&window);

    assert_eq!(window.load_older(5).unwrap(), 0);
}
