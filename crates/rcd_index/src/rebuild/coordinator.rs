//! Sequential, priority-ordered rebuild of many indexes.

use super::{CancellationToken, RebuildDescriptor, RebuildRequest, RebuildStatus, RebuildSummary, RebuildUnit};
use crate::error::{IndexError, IndexResult};
use crate::events::{EventBus, IndexEvent};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Rebuilds the indexes of registered units.
///
/// Units run one after the other. A failing unit is reported and the
/// remaining units still run. Cancellation is checked before each unit;
/// a started unit runs to completion.
pub struct RebuildCoordinator {
    units: Vec<Arc<dyn RebuildUnit>>,
    events: Arc<EventBus>,
}

impl RebuildCoordinator {
    /// Creates a coordinator publishing to `events`.
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            units: Vec::new(),
            events,
        }
    }

    /// Registers a unit. A unit with the same name is replaced.
    pub fn register(&mut self, unit: Arc<dyn RebuildUnit>) {
        self.units.retain(|existing| existing.name() != unit.name());
        self.units.push(unit);
    }

    /// Returns the registered unit names in execution order.
    pub fn unit_names(&self) -> Vec<&str> {
        self.ordered().into_iter().map(|unit| unit.name()).collect()
    }

    /// Returns the event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Rebuilds the requested units.
    ///
    /// Without `force`, only corrupted units are rebuilt. Publishes
    /// [`IndexEvent::Rebuilt`] after every finished unit.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if a target names no registered unit. Unit
    /// failures are reported in the summary instead.
    pub fn rebuild_all(
        &self,
        request: &RebuildRequest,
        cancel: &CancellationToken,
    ) -> IndexResult<RebuildSummary> {
        let units = self.resolve(request.targets.as_deref())?;
        let started = Instant::now();
        info!(
            "rebuilding {} indexes{}",
            units.len(),
            if request.force { " (forced)" } else { "" }
        );

        let mut summary = RebuildSummary::default();
        for unit in units {
            let descriptor = if cancel.is_cancelled() {
                debug!("rebuild of {} cancelled", unit.name());
                RebuildDescriptor::new(unit.name(), RebuildStatus::Canceled)
            } else {
                self.run_unit(unit.as_ref(), request.force)
            };
            summary.push(descriptor);
        }

        info!(
            "rebuild finished in {:?}: {} rebuilt, {} skipped, {} failed, {} cancelled",
            started.elapsed(),
            summary.finished,
            summary.skipped,
            summary.errors,
            summary.cancelled
        );
        Ok(summary)
    }

    /// Runs a rebuild for a [`IndexEvent::RebuildRequested`] event. Other
    /// events are ignored.
    ///
    /// # Errors
    ///
    /// Same as [`rebuild_all`](Self::rebuild_all).
    pub fn handle(
        &self,
        event: &IndexEvent,
        cancel: &CancellationToken,
    ) -> IndexResult<Option<RebuildSummary>> {
        match event {
            IndexEvent::RebuildRequested { targets, force } => {
                let request = RebuildRequest {
                    targets: targets.clone(),
                    force: *force,
                };
                self.rebuild_all(&request, cancel).map(Some)
            }
            IndexEvent::Rebuilt { .. } => Ok(None),
        }
    }

    fn run_unit(&self, unit: &dyn RebuildUnit, force: bool) -> RebuildDescriptor {
        let name = unit.name();
        if !force {
            match unit.is_corrupted() {
                Ok(false) => {
                    debug!("index {} is intact, skipping", name);
                    return RebuildDescriptor::new(name, RebuildStatus::Skipped);
                }
                Ok(true) => info!("index {} is corrupted", name),
                Err(e) => {
                    error!("corruption check of {} failed: {}", name, e);
                    return RebuildDescriptor::failed(name, e);
                }
            }
        }

        match unit.execute_rebuild() {
            Ok(document_count) => {
                self.events.publish(IndexEvent::Rebuilt {
                    entity_type: name.to_string(),
                    document_count,
                });
                RebuildDescriptor::finished(name, document_count)
            }
            Err(e) => {
                error!("rebuild of {} failed: {}", name, e);
                RebuildDescriptor::failed(name, e)
            }
        }
    }

    fn ordered(&self) -> Vec<&Arc<dyn RebuildUnit>> {
        let mut units: Vec<_> = self.units.iter().collect();
        units.sort_by(|a, b| a.priority().cmp(&b.priority()).then_with(|| a.name().cmp(b.name())));
        units
    }

    fn resolve(&self, targets: Option<&[String]>) -> IndexResult<Vec<&Arc<dyn RebuildUnit>>> {
        let ordered = self.ordered();
        let Some(targets) = targets else {
            return Ok(ordered);
        };
        if let Some(missing) = targets.iter().find(|target| {
            !ordered
                .iter()
                .any(|unit| unit.name().eq_ignore_ascii_case(target))
        }) {
            return Err(IndexError::not_found("RebuildUnit", missing.as_str()));
        }
        Ok(ordered
            .into_iter()
            .filter(|unit| targets.iter().any(|target| unit.name().eq_ignore_ascii_case(target)))
            .collect())
    }
}

impl std::fmt::Debug for RebuildCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildCoordinator")
            .field("units", &self.unit_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FakeUnit {
        name: String,
        priority: i32,
        corrupted: bool,
        fail: bool,
        documents: usize,
        log: Arc<Mutex<Vec<String>>>,
        on_rebuild: Option<CancellationToken>,
    }

    impl FakeUnit {
        fn new(name: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.into(),
                priority,
                corrupted: true,
                fail: false,
                documents: 1,
                log: Arc::clone(log),
                on_rebuild: None,
            }
        }
    }

    impl RebuildUnit for FakeUnit {
        fn name(&self) -> &str {
            &self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn is_corrupted(&self) -> IndexResult<bool> {
            Ok(self.corrupted)
        }

        fn total_document_count(&self) -> IndexResult<usize> {
            Ok(self.documents)
        }

        fn execute_rebuild(&self) -> IndexResult<usize> {
            self.log.lock().push(self.name.clone());
            if let Some(token) = &self.on_rebuild {
                token.cancel();
            }
            if self.fail {
                Err(IndexError::Cancelled)
            } else {
                Ok(self.documents)
            }
        }
    }

    fn coordinator(units: Vec<FakeUnit>) -> RebuildCoordinator {
        let mut coordinator = RebuildCoordinator::new(Arc::new(EventBus::new()));
        for unit in units {
            coordinator.register(Arc::new(unit));
        }
        coordinator
    }

    #[test]
    fn units_run_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![
            FakeUnit::new("Field", 30, &log),
            FakeUnit::new("Group", 0, &log),
            FakeUnit::new("Dictionary", 10, &log),
        ]);

        let summary = coordinator
            .rebuild_all(&RebuildRequest::all(), &CancellationToken::new())
            .unwrap();

        assert_eq!(*log.lock(), vec!["Group", "Dictionary", "Field"]);
        assert_eq!(summary.finished, 3);
        assert_eq!(coordinator.unit_names(), vec!["Group", "Dictionary", "Field"]);
    }

    #[test]
    fn intact_units_are_skipped_unless_forced() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut intact = FakeUnit::new("Group", 0, &log);
        intact.corrupted = false;
        let coordinator = coordinator(vec![intact, FakeUnit::new("Field", 30, &log)]);

        let summary = coordinator
            .rebuild_all(&RebuildRequest::all(), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.unit("Group").unwrap().status, RebuildStatus::Skipped);
        assert_eq!(*log.lock(), vec!["Field"]);

        let summary = coordinator
            .rebuild_all(&RebuildRequest::all().force(true), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.finished, 2);
    }

    #[test]
    fn failure_does_not_stop_later_units() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut failing = FakeUnit::new("Dictionary", 10, &log);
        failing.fail = true;
        let coordinator = coordinator(vec![failing, FakeUnit::new("Field", 30, &log)]);

        let summary = coordinator
            .rebuild_all(&RebuildRequest::all(), &CancellationToken::new())
            .unwrap();

        assert_eq!(summary.errors, 1);
        assert_eq!(summary.finished, 1);
        let failed = summary.unit("Dictionary").unwrap();
        assert_eq!(failed.status, RebuildStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("operation cancelled"));
    }

    #[test]
    fn cancellation_marks_unstarted_units() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let token = CancellationToken::new();
        let mut first = FakeUnit::new("Group", 0, &log);
        first.on_rebuild = Some(token.clone());
        let coordinator = coordinator(vec![
            first,
            FakeUnit::new("Dictionary", 10, &log),
            FakeUnit::new("Field", 30, &log),
        ]);

        let summary = coordinator.rebuild_all(&RebuildRequest::all(), &token).unwrap();

        assert_eq!(summary.unit("Group").unwrap().status, RebuildStatus::Finished);
        assert_eq!(summary.cancelled, 2);
        assert_eq!(*log.lock(), vec!["Group"]);
    }

    #[test]
    fn targets_restrict_the_run() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![
            FakeUnit::new("Group", 0, &log),
            FakeUnit::new("Field", 30, &log),
        ]);

        let summary = coordinator
            .rebuild_all(&RebuildRequest::all().targets(["field"]), &CancellationToken::new())
            .unwrap();
        assert_eq!(summary.units.len(), 1);
        assert_eq!(*log.lock(), vec!["Field"]);

        let err = coordinator
            .rebuild_all(&RebuildRequest::all().targets(["Nope"]), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, IndexError::NotFound { .. }));
    }

    #[test]
    fn finished_units_publish_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut unit = FakeUnit::new("Group", 0, &log);
        unit.documents = 7;
        let coordinator = coordinator(vec![unit]);
        let events = coordinator.events().subscribe();

        coordinator
            .handle(
                &IndexEvent::RebuildRequested {
                    targets: None,
                    force: true,
                },
                &CancellationToken::new(),
            )
            .unwrap()
            .unwrap();

        let received = events.try_recv().unwrap();
        assert_eq!(
            received.event,
            IndexEvent::Rebuilt {
                entity_type: "Group".into(),
                document_count: 7,
            }
        );
    }

    #[test]
    fn rebuilt_events_are_ignored() {
        let coordinator = coordinator(Vec::new());
        let event = IndexEvent::Rebuilt {
            entity_type: "Group".into(),
            document_count: 1,
        };
        assert!(coordinator
            .handle(&event, &CancellationToken::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn registering_twice_replaces() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = coordinator(vec![
            FakeUnit::new("Group", 0, &log),
            FakeUnit::new("Group", 5, &log),
        ]);
        assert_eq!(coordinator.unit_names(), vec!["Group"]);
    }
}
