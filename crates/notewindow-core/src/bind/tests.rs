use std::sync::Arc;

use super::*;
use crate::cache::texture::testing::RecordingSource;
use crate::cache::{Annotation, NullImageSource};
use crate::config::WindowConfig;
use crate::models::{AuthorProfile, WindowQuery};
use crate::store::memory::fixtures::{author, note};
use crate::store::MemoryGateway;

fn seeded_window(count: u64) -> (Arc<MemoryGateway>, EventWindow<MemoryGateway>) {
    let store = Arc::new(MemoryGateway::new());
    for i in 0..count {
        store.insert(note(i, 1_000 + i));
    }
    let mut window = EventWindow::with_query(store.clone(), WindowConfig::default(), WindowQuery::global());
    window.refresh().unwrap();
    (store, window)
}

fn controller() -> BindController {
    BindController::new(Arc::new(TextureCache::new(16, Arc::new(NullImageSource))))
}

#[test]
fn test_tier1_never_opens_a_transaction() {
    let (store, window) = seeded_window(40);
    let mut binder = controller();
    let opened = store.transactions_opened();

    for (i, key) in window.keys().iter().enumerate() {
        binder.bind_tier1(&window, RowId(i as u64), *key);
    }
    assert_eq!(store.transactions_opened(), opened);

    let row = binder.row(RowId(0)).unwrap();
    assert!(row.placeholder);
    assert_eq!(row.author_label, format!("note:{}", window.item_at(0).unwrap()));
    assert_eq!(row.body, PLACEHOLDER_BODY);
}

#[test]
fn test_tier2_loads_and_applies() {
    let (_store, mut window) = seeded_window(3);
    let mut binder = controller();
    let key = window.item_at(0).unwrap();

    let ticket = binder.bind_tier1(&window, RowId(1), key);
    assert_eq!(binder.tier2_state(RowId(1)), Some(Tier2State::Scheduled));
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::Applied);
    assert_eq!(binder.tier2_state(RowId(1)), Some(Tier2State::Done));

    let row = binder.row(RowId(1)).unwrap();
    assert!(!row.placeholder);
    assert_eq!(row.body, "note 2");
    assert_eq!(row.author_label, "aaaaaaaa...");
    assert_eq!(row.created_at, Some(1_002));
    assert_eq!(row.avatar, AvatarState::None);
}

#[test]
fn test_stale_tier2_is_discarded() {
    let (store, mut window) = seeded_window(3);
    let mut binder = controller();
    let first = window.item_at(0).unwrap();
    let second = window.item_at(1).unwrap();

    let stale = binder.bind_tier1(&window, RowId(7), first);
    let current = binder.bind_tier1(&window, RowId(7), second);

    let opened = store.transactions_opened();
    assert_eq!(binder.bind_tier2(&mut window, stale), Tier2Outcome::Stale);
    assert_eq!(store.transactions_opened(), opened);
    assert!(!window.entry(first).unwrap().is_loaded());
    assert_eq!(binder.bound_key(RowId(7)), Some(second));

    assert_eq!(binder.bind_tier2(&mut window, current), Tier2Outcome::Applied);
    assert_eq!(binder.row(RowId(7)).unwrap().body, "note 1");
}

#[test]
fn test_unbind_cancels_tier2() {
    let (_store, mut window) = seeded_window(2);
    let mut binder = controller();
    let key = window.item_at(0).unwrap();

    // Never bound
    binder.unbind(RowId(3));
    assert!(binder.row(RowId(3)).is_none());

    let ticket = binder.bind_tier1(&window, RowId(3), key);
    binder.unbind(RowId(3));
    assert_eq!(binder.tier2_state(RowId(3)), Some(Tier2State::Cancelled));
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::Stale);
    assert!(binder.row(RowId(3)).is_none());

    // Unbinding twice is harmless
    binder.unbind(RowId(3));
}

#[test]
fn test_busy_store_keeps_row_scheduled() {
    let (store, mut window) = seeded_window(2);
    let mut binder = controller();
    let key = window.item_at(0).unwrap();
    let ticket = binder.bind_tier1(&window, RowId(0), key);

    store.set_busy(true);
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::PayloadUnavailable);
    assert_eq!(binder.tier2_state(RowId(0)), Some(Tier2State::Scheduled));
    assert!(binder.row(RowId(0)).unwrap().placeholder);

    store.set_busy(false);
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::Applied);
    assert!(!binder.row(RowId(0)).unwrap().placeholder);
}

#[test]
fn test_evicted_entry_is_stale() {
    let (_store, mut window) = seeded_window(2);
    let mut binder = controller();
    let key = window.item_at(0).unwrap();
    let ticket = binder.bind_tier1(&window, RowId(0), key);
    window.remove(key);
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::Stale);
}

#[test]
fn test_avatar_fetch_fills_waiting_rows_only() {
    let (store, mut window) = seeded_window(2);
    store.set_profile(
        author(0xaa),
        AuthorProfile {
            name: Some("erin".into()),
            picture: Some("https://img/erin.png".into()),
            ..Default::default()
        },
    );
    let source = Arc::new(RecordingSource::default());
    let textures = Arc::new(TextureCache::new(16, source.clone()));
    let mut binder = BindController::new(textures.clone());

    let first = window.item_at(0).unwrap();
    let second = window.item_at(1).unwrap();
    let t1 = binder.bind_tier1(&window, RowId(1), first);
    let t2 = binder.bind_tier1(&window, RowId(2), second);
    assert_eq!(binder.bind_tier2(&mut window, t1), Tier2Outcome::Applied);
    assert_eq!(binder.bind_tier2(&mut window, t2), Tier2Outcome::Applied);

    let row = binder.row(RowId(1)).unwrap();
    assert_eq!(row.author_label, "erin");
    assert_eq!(row.avatar, AvatarState::Loading("https://img/erin.png".into()));
    assert_eq!(source.requests.lock().len(), 1);

    // Row 2 gets recycled before the texture arrives
    binder.unbind(RowId(2));

    let filled = binder.on_texture_ready("https://img/erin.png", TextureHandle(5));
    assert_eq!(filled, vec![RowId(1)]);
    assert_eq!(binder.row(RowId(1)).unwrap().avatar, AvatarState::Ready(TextureHandle(5)));

    // Later binds hit the cache directly
    let t3 = binder.bind_tier1(&window, RowId(2), second);
    assert_eq!(binder.bind_tier2(&mut window, t3), Tier2Outcome::Applied);
    assert_eq!(binder.row(RowId(2)).unwrap().avatar, AvatarState::Ready(TextureHandle(5)));
}

#[test]
fn test_entry_changes_route_to_bound_rows() {
    let (_store, mut window) = seeded_window(2);
    let events = window.take_events().unwrap();
    let mut binder = controller();
    let key = window.item_at(0).unwrap();
    let other = window.item_at(1).unwrap();
    binder.bind_tier1(&window, RowId(1), key);
    binder.bind_tier1(&window, RowId(2), other);
    events.try_iter().for_each(drop);

    window.annotate(key, Annotation::Liked(true));
    let mut updated = Vec::new();
    for event in events.try_iter() {
        updated.extend(binder.apply_event(&window, &event));
    }
    assert_eq!(updated, vec![RowId(1)]);
    assert!(binder.row(RowId(1)).unwrap().liked);
    assert!(!binder.row(RowId(2)).unwrap().liked);

    // Unbound rows no longer receive changes
    binder.unbind(RowId(1));
    window.annotate(key, Annotation::Muted(true));
    let updated: Vec<RowId> = events
        .try_iter()
        .flat_map(|event| binder.apply_event(&window, &event))
        .collect();
    assert!(updated.is_empty());
}

#[test]
fn test_expired_payload_makes_tier2_stale() {
    let store = Arc::new(MemoryGateway::new());
    let mut record = note(1, 50);
    record.tags.push(vec!["expiration".into(), "1".into()]);
    let key = store.insert(record);
    let mut window = EventWindow::with_query(store.clone(), WindowConfig::default(), WindowQuery::global());
    window.refresh().unwrap();
    let mut binder = controller();

    let ticket = binder.bind_tier1(&window, RowId(0), key);
    assert_eq!(binder.bind_tier2(&mut window, ticket), Tier2Outcome::Stale);
    assert!(!window.contains(key));
    assert!(binder.row(RowId(0)).unwrap().placeholder);
}
