//! Rebuilds against live readers and writers.

use rcd_index::{
    CancellationToken, EventBus, IndexEvent, RebuildCoordinator, RebuildRequest, RebuildStatus,
};
use rcd_model::{ActivityFilter, Dictionary, FilterCriteria, Group};
use rcd_testkit::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn all() -> FilterCriteria {
    FilterCriteria::new().activity(ActivityFilter::ALL)
}

#[test]
fn repeated_rebuilds_never_hide_documents() {
    let index = TestService::with_config(scenarios::numbered_dictionaries(40), |config| {
        config.rebuild_page_size(7)
    });
    assert_eq!(index.execute_rebuild().unwrap(), 40);

    let done = AtomicBool::new(false);
    std::thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut reads = 0;
            while !done.load(Ordering::Acquire) {
                assert_eq!(index.count(&all()).unwrap(), 40);
                reads += 1;
            }
            reads
        });
        for _ in 0..5 {
            assert_eq!(index.execute_rebuild().unwrap(), 40);
        }
        done.store(true, Ordering::Release);
        assert!(reader.join().unwrap() > 0);
    });

    let page = index.find_by_criteria(&all().page(0, 3)).unwrap();
    let names: Vec<&str> = page.items.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["d000", "d001", "d002"]);
    assert!(!index.is_corrupted().unwrap());
}

#[test]
fn failed_rebuild_keeps_previous_content() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(FailingStore::new(scenarios::numbered_dictionaries(10), 2));
    let service = open_service(&temp, Arc::clone(&store) as _, |config| {
        config.rebuild_page_size(3)
    });

    let previous = scenarios::alpha_beta_gamma();
    let mut tx = service.begin().unwrap();
    tx.upsert_all(&previous).unwrap();
    tx.commit().unwrap();
    let generation = service.manager().generation();

    assert!(service.is_corrupted().unwrap());
    let err = service.execute_rebuild().unwrap_err();
    assert!(matches!(err, rcd_index::IndexError::Storage(_)));

    assert_eq!(service.count(&all()).unwrap(), 3);
    assert_eq!(service.manager().generation(), generation);
    assert!(!service.manager().is_rebuilding());
    assert_eq!(service.manager().stats().rebuilds(), 0);
}

#[test]
fn writes_during_a_rebuild_are_kept() {
    let temp = TempDir::new().unwrap();
    let (store, pause) = PausingStore::new(scenarios::numbered_dictionaries(5));
    let store = Arc::new(store);
    let service = open_service(&temp, Arc::clone(&store) as _, |config| config);

    let late = Dictionary::new(scenarios::GROUP_ID, "late");
    let rebuilt = std::thread::scope(|scope| {
        let rebuild = scope.spawn(|| service.execute_rebuild());
        pause.wait_started();

        store.put(late.clone());
        let mut tx = service.begin().unwrap();
        tx.upsert(&late).unwrap();
        tx.commit().unwrap();

        pause.release();
        rebuild.join().unwrap()
    });

    assert_eq!(rebuilt.unwrap(), 6);
    assert_eq!(service.count(&all()).unwrap(), 6);
    assert_eq!(service.get_by_id(&late.id).unwrap(), late);
    assert!(!service.is_corrupted().unwrap());
}

#[test]
fn coordinator_rebuilds_only_corrupted_units() {
    let groups = TestService::synced(vec![Group::new("geo")]);
    let dictionaries = TestService::<Dictionary>::with_entities(scenarios::alpha_beta_gamma());

    let events = Arc::new(EventBus::new());
    let received = events.subscribe();
    let mut coordinator = RebuildCoordinator::new(Arc::clone(&events));
    coordinator.register(dictionaries.unit());
    coordinator.register(groups.unit());
    assert_eq!(coordinator.unit_names(), vec!["Group", "Dictionary"]);

    let summary = coordinator
        .rebuild_all(&RebuildRequest::all(), &CancellationToken::new())
        .unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.unit("Group").unwrap().status, RebuildStatus::Skipped);
    let rebuilt = summary.unit("Dictionary").unwrap();
    assert_eq!(rebuilt.status, RebuildStatus::Finished);
    assert_eq!(rebuilt.document_count, 3);
    assert!(!dictionaries.is_corrupted().unwrap());

    let event = received.try_recv().unwrap();
    assert!(matches!(
        event.event,
        IndexEvent::Rebuilt { ref entity_type, document_count: 3 } if entity_type == "Dictionary"
    ));
}
