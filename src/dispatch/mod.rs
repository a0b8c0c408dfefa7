//! Lifecycle event dispatch
//!
//! `ChangeTracker` receives lifecycle events from the host and decides,
//! in this order, whether each one becomes a log entry:
//!
//! 1. the action kind is tracked and the entity type is registered
//! 2. ambient logging is not disabled
//! 3. the event is not a raw load (when raw loads are skipped)
//! 4. the diff succeeds and, for updates, is non-empty
//! 5. no pre-log observer vetoes
//!
//! Failures after step 1 never reach the caller. They are logged with
//! `tracing` and handed to post-log observers, and the host's own write
//! proceeds regardless.

mod event;
pub mod hooks;

pub use event::{EventPayload, LifecycleEvent};
pub use hooks::{
    LogHooks, PostLogEvent, PostLogObserver, PreLogDecision, PreLogEvent, PreLogObserver,
};

use std::sync::Arc;

use crate::audit::{
    Action, ChangePayload, DiffEngine, LogEntry, StateSnapshot, DEFAULT_OBJECT_REPR,
};
use crate::context::{self, CidResolver};
use crate::error::{TrackError, TrackResult};
use crate::models::{FieldCatalog, LogEntryId};
use crate::registry::{Registry, TrackedEntityConfig};
use crate::storage::LogStore;

/// Why an event never reached the diff stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    ActionNotTracked,
    Unregistered,
    Disabled,
    RawLoad,
    /// Relation change on a field not tracked as multi-valued
    FieldNotTracked,
}

/// Why a diffed event produced no entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    NoChanges,
    Vetoed,
    DiffFailed,
    PersistenceFailed,
}

/// Final state of one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Suppressed(SuppressReason),
    Discarded(DiscardReason),
    Emitted(LogEntryId),
}

impl DispatchOutcome {
    pub fn entry_id(&self) -> Option<LogEntryId> {
        match self {
            DispatchOutcome::Emitted(id) => Some(*id),
            _ => None,
        }
    }
}

struct Computed {
    changes: ChangePayload,
    full_state: Option<StateSnapshot>,
    empty_update: bool,
}

/// Turns lifecycle events into log entries
pub struct ChangeTracker {
    registry: Arc<Registry>,
    catalog: Arc<dyn FieldCatalog>,
    store: Arc<dyn LogStore>,
    engine: DiffEngine,
    hooks: LogHooks,
    cid: CidResolver,
    disable_on_raw_save: bool,
}

/// Builder for [`ChangeTracker`]
pub struct ChangeTrackerBuilder {
    tracker: ChangeTracker,
}

impl ChangeTrackerBuilder {
    pub fn engine(mut self, engine: DiffEngine) -> Self {
        self.tracker.engine = engine;
        self
    }

    pub fn cid(mut self, cid: CidResolver) -> Self {
        self.tracker.cid = cid;
        self
    }

    pub fn disable_on_raw_save(mut self, disable: bool) -> Self {
        self.tracker.disable_on_raw_save = disable;
        self
    }

    pub fn build(self) -> ChangeTracker {
        self.tracker
    }
}

impl ChangeTracker {
    pub fn builder(
        registry: Arc<Registry>,
        catalog: Arc<dyn FieldCatalog>,
        store: Arc<dyn LogStore>,
    ) -> ChangeTrackerBuilder {
        ChangeTrackerBuilder {
            tracker: Self {
                registry,
                catalog,
                store,
                engine: DiffEngine::new(),
                hooks: LogHooks::new(),
                cid: CidResolver::new(),
                disable_on_raw_save: false,
            },
        }
    }

    /// Builder over the process-wide [`Registry::global`]
    pub fn with_global_registry(
        catalog: Arc<dyn FieldCatalog>,
        store: Arc<dyn LogStore>,
    ) -> ChangeTrackerBuilder {
        Self::builder(Registry::global(), catalog, store)
    }

    pub fn hooks(&self) -> &LogHooks {
        &self.hooks
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Process one lifecycle event
    pub fn handle(&self, event: LifecycleEvent) -> DispatchOutcome {
        let action = event.action();
        let span = tracing::debug_span!(
            "track",
            entity_type = %event.entity_type,
            pk = %event.pk,
            %action
        );
        let _span = span.enter();

        if !self.registry.actions().allows(action) {
            return DispatchOutcome::Suppressed(SuppressReason::ActionNotTracked);
        }
        let Some(config) = self.registry.get_config(&event.entity_type) else {
            return DispatchOutcome::Suppressed(SuppressReason::Unregistered);
        };
        if context::is_disabled() {
            tracing::trace!("logging disabled in this scope");
            return DispatchOutcome::Suppressed(SuppressReason::Disabled);
        }
        if event.raw && self.disable_on_raw_save {
            return DispatchOutcome::Suppressed(SuppressReason::RawLoad);
        }

        let computed = match self.compute(&config, &event) {
            Ok(Some(computed)) => computed,
            Ok(None) => return DispatchOutcome::Suppressed(SuppressReason::FieldNotTracked),
            Err(err) => {
                tracing::warn!(error = %err, "change computation failed");
                self.hooks.run_post_log(&PostLogEvent {
                    entity_type: &event.entity_type,
                    pk: &event.pk,
                    action,
                    changes: None,
                    log_entry: None,
                    error: Some(&err),
                });
                return DispatchOutcome::Discarded(DiscardReason::DiffFailed);
            }
        };

        if computed.empty_update {
            return DispatchOutcome::Discarded(DiscardReason::NoChanges);
        }

        let decision = self.hooks.run_pre_log(&PreLogEvent {
            entity_type: &event.entity_type,
            pk: &event.pk,
            action,
            changes: &computed.changes,
        });
        if decision == PreLogDecision::Veto {
            return DispatchOutcome::Discarded(DiscardReason::Vetoed);
        }

        let entry = self.build_entry(&event, action, computed.changes, computed.full_state);

        match self.store.append(&entry) {
            Ok(id) => {
                tracing::debug!(entry = %id, "log entry emitted");
                self.hooks.run_post_log(&PostLogEvent {
                    entity_type: &event.entity_type,
                    pk: &event.pk,
                    action,
                    changes: Some(entry.changes()),
                    log_entry: Some(&entry),
                    error: None,
                });
                DispatchOutcome::Emitted(id)
            }
            Err(err) => {
                let err = match err {
                    err @ TrackError::Persistence(_) => err,
                    other => TrackError::Persistence(other.to_string()),
                };
                tracing::warn!(error = %err, "log entry could not be stored");
                self.hooks.run_post_log(&PostLogEvent {
                    entity_type: &event.entity_type,
                    pk: &event.pk,
                    action,
                    changes: Some(entry.changes()),
                    log_entry: None,
                    error: Some(&err),
                });
                DispatchOutcome::Discarded(DiscardReason::PersistenceFailed)
            }
        }
    }

    fn compute(
        &self,
        config: &TrackedEntityConfig,
        event: &LifecycleEvent,
    ) -> TrackResult<Option<Computed>> {
        let fields = self.catalog.fields(&event.entity_type).ok_or_else(|| {
            TrackError::DiffComputation(format!(
                "no field metadata for {}",
                event.entity_type
            ))
        })?;

        let mut set = match &event.payload {
            EventPayload::Create { new } => self.engine.diff(config, None, Some(new), &fields)?,
            EventPayload::Update {
                old,
                new,
                update_fields,
            } => self.engine.diff_fields(
                config,
                Some(old),
                Some(new),
                &fields,
                update_fields.as_deref(),
            )?,
            EventPayload::Delete { old } => self.engine.diff(config, Some(old), None, &fields)?,
            EventPayload::Access { current } => {
                self.engine.state_only(config, current.as_ref(), &fields)?
            }
            EventPayload::Relation {
                field,
                operation,
                related,
            } => {
                return Ok(self
                    .engine
                    .relation_change(config, field, *operation, related, &fields)
                    .map(|change| Computed {
                        changes: change.payload(),
                        full_state: None,
                        empty_update: false,
                    }));
            }
        };

        Ok(Some(Computed {
            changes: set.payload(),
            empty_update: set.is_empty() && event.action() == Action::Update,
            full_state: set.take_full_state(),
        }))
    }

    fn build_entry(
        &self,
        event: &LifecycleEvent,
        action: Action,
        changes: ChangePayload,
        full_state: Option<StateSnapshot>,
    ) -> LogEntry {
        let ambient = context::current();
        let repr = event
            .repr
            .clone()
            .or_else(|| {
                self.catalog
                    .describe(&event.entity_type, &event.pk, event.current_snapshot())
            })
            .unwrap_or_else(|| DEFAULT_OBJECT_REPR.to_string());

        let mut builder = LogEntry::builder(event.entity_type.clone(), event.pk.clone(), action)
            .repr(repr)
            .changes(changes)
            .serialized_data(full_state)
            .cid(self.cid.for_entry())
            .actor(ambient.actor)
            .remote_addr(ambient.remote_addr)
            .additional_data(event.additional_data.clone());
        if let Some(timestamp) = event.timestamp {
            builder = builder.timestamp(timestamp);
        }
        builder.build()
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("registry", &self.registry)
            .field("engine", &self.engine)
            .field("hooks", &self.hooks)
            .field("cid", &self.cid)
            .field("disable_on_raw_save", &self.disable_on_raw_save)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ChangeValue, Masker};
    use crate::context::{AmbientContext, RequestBoundary, RequestInfo};
    use crate::models::{
        Actor, EntityType, FieldKind, FieldMeta, RelatedRecord, Snapshot, StaticCatalog,
    };
    use crate::registry::{ActionSet, TrackedEntityConfig};
    use crate::storage::{LogFilter, MemoryStore};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn catalog() -> Arc<StaticCatalog> {
        Arc::new(
            StaticCatalog::new()
                .entity(
                    "blog.Article",
                    [
                        FieldMeta::new("title", FieldKind::Text),
                        FieldMeta::new("ssn", FieldKind::Text),
                        FieldMeta::new("views", FieldKind::Integer),
                        FieldMeta::new("tags", FieldKind::Relation),
                    ],
                )
                .entity("blog.Unregistered", [FieldMeta::new("name", FieldKind::Text)])
                .repr_field("blog.Article", "title"),
        )
    }

    fn setup_with(config: TrackedEntityConfig) -> (ChangeTracker, Arc<MemoryStore>) {
        let registry = Arc::new(Registry::new());
        registry.register("blog.Article", config).unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone()).build();
        (tracker, store)
    }

    fn setup() -> (ChangeTracker, Arc<MemoryStore>) {
        setup_with(
            TrackedEntityConfig::builder()
                .mask(["ssn"])
                .multi_valued(["tags"])
                .build(),
        )
    }

    fn article(title: &str, views: i64) -> Snapshot {
        Snapshot::new()
            .with("title", title)
            .with("ssn", "123-45-6789")
            .with("views", views)
    }

    #[test]
    fn test_create_emits_entry() {
        let (tracker, store) = setup();
        let _actor = context::set_actor(Actor::new("7").with_display("ada"));

        let outcome = tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        let id = outcome.entry_id().unwrap();

        let entry = store.get(id).unwrap().unwrap();
        assert_eq!(entry.action(), Action::Create);
        assert_eq!(entry.object_repr(), "Hi");
        assert_eq!(entry.object_id(), Some(1));
        assert_eq!(entry.actor().unwrap().id, "7");
        assert_eq!(
            entry.changes().get("ssn"),
            Some(&ChangeValue::Field(json!(null), json!("*****5-6789")))
        );
        assert_eq!(
            entry.changes().keys().collect::<Vec<_>>(),
            ["title", "ssn", "views"]
        );
    }

    #[test]
    fn test_update_without_changes_is_discarded() {
        let (tracker, store) = setup();
        let outcome = tracker.handle(LifecycleEvent::update(
            "blog.Article",
            "1",
            article("Hi", 1),
            article("Hi", 1),
        ));
        assert_eq!(outcome, DispatchOutcome::Discarded(DiscardReason::NoChanges));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_records_diff() {
        let (tracker, store) = setup();
        tracker.handle(LifecycleEvent::update(
            "blog.Article",
            "1",
            article("Hi", 1),
            article("Hi", 2),
        ));
        let entries = store.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].changes().get("views"),
            Some(&ChangeValue::Field(json!(1), json!(2)))
        );
        assert_eq!(entries[0].changes().len(), 1);
    }

    #[test]
    fn test_delete_logged_with_repr() {
        let (tracker, store) = setup();
        tracker.handle(LifecycleEvent::delete("blog.Article", "1", article("Gone", 3)));
        let entry = &store.all().unwrap()[0];
        assert_eq!(entry.action(), Action::Delete);
        assert_eq!(entry.summary(), "Deleted Gone");
    }

    #[test]
    fn test_unregistered_is_suppressed() {
        let (tracker, store) = setup();
        let outcome = tracker.handle(LifecycleEvent::create(
            "blog.Unregistered",
            "1",
            Snapshot::new().with("name", "x"),
        ));
        assert_eq!(outcome, DispatchOutcome::Suppressed(SuppressReason::Unregistered));
        assert!(store.is_empty());
    }

    #[test]
    fn test_disabled_scope_suppresses() {
        let (tracker, store) = setup();
        {
            let _off = context::disable();
            let outcome =
                tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
            assert_eq!(outcome, DispatchOutcome::Suppressed(SuppressReason::Disabled));
        }
        tracker.handle(LifecycleEvent::create("blog.Article", "2", article("Hi", 0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_raw_load_suppressed_when_configured() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Article", TrackedEntityConfig::default())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone())
            .disable_on_raw_save(true)
            .build();

        let outcome = tracker.handle(
            LifecycleEvent::create("blog.Article", "1", article("Hi", 0)).raw(true),
        );
        assert_eq!(outcome, DispatchOutcome::Suppressed(SuppressReason::RawLoad));

        let (tracker, store) = setup();
        tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)).raw(true));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_action_not_tracked() {
        let registry = Arc::new(Registry::with_actions(ActionSet {
            access: false,
            ..ActionSet::all()
        }));
        registry
            .register("blog.Article", TrackedEntityConfig::default())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store).build();

        assert_eq!(
            tracker.handle(LifecycleEvent::access("blog.Article", "1", None)),
            DispatchOutcome::Suppressed(SuppressReason::ActionNotTracked)
        );
    }

    #[test]
    fn test_access_logged_without_changes() {
        let (tracker, store) = setup();
        let outcome = tracker.handle(LifecycleEvent::access("blog.Article", "1", None));
        assert!(outcome.entry_id().is_some());
        let entry = &store.all().unwrap()[0];
        assert!(entry.changes().is_empty());
        assert_eq!(entry.object_repr(), "blog.Article object (1)");
    }

    #[test]
    fn test_veto_discards() {
        let (tracker, store) = setup();
        tracker.hooks().subscribe_pre_log(|event: &PreLogEvent<'_>| {
            if event.changes.contains_key("views") {
                PreLogDecision::Veto
            } else {
                PreLogDecision::Proceed
            }
        });

        let outcome = tracker.handle(LifecycleEvent::update(
            "blog.Article",
            "1",
            article("Hi", 1),
            article("Hi", 2),
        ));
        assert_eq!(outcome, DispatchOutcome::Discarded(DiscardReason::Vetoed));
        assert!(store.is_empty());
    }

    #[test]
    fn test_post_log_sees_entry() {
        let (tracker, _store) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        tracker.hooks().subscribe_post_log(move |event: &PostLogEvent<'_>| {
            sink.lock()
                .unwrap()
                .push((event.log_created(), event.error.is_some()));
        });

        tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        assert_eq!(*seen.lock().unwrap(), vec![(true, false)]);
    }

    struct FailingStore;

    impl LogStore for FailingStore {
        fn append(&self, _entry: &LogEntry) -> TrackResult<LogEntryId> {
            Err(TrackError::Io("disk full".into()))
        }

        fn query(&self, _filter: &LogFilter) -> TrackResult<Vec<LogEntry>> {
            Ok(Vec::new())
        }

        fn delete_matching(&self, _filter: &LogFilter) -> TrackResult<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_persistence_failure_reaches_post_log_only() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Article", TrackedEntityConfig::default())
            .unwrap();
        let tracker = ChangeTracker::builder(registry, catalog(), Arc::new(FailingStore)).build();

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        tracker.hooks().subscribe_post_log(move |event: &PostLogEvent<'_>| {
            if event.error.is_some_and(|e| e.is_persistence()) && !event.log_created() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let outcome = tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        assert_eq!(
            outcome,
            DispatchOutcome::Discarded(DiscardReason::PersistenceFailed)
        );
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_diff_failure_reaches_post_log() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Orphan", TrackedEntityConfig::default())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone()).build();

        let errors = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&errors);
        tracker.hooks().subscribe_post_log(move |event: &PostLogEvent<'_>| {
            if event.error.is_some_and(|e| e.is_diff()) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let outcome = tracker.handle(LifecycleEvent::create("blog.Orphan", "1", Snapshot::new()));
        assert_eq!(outcome, DispatchOutcome::Discarded(DiscardReason::DiffFailed));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_relation_changes() {
        let (tracker, store) = setup();
        tracker.handle(LifecycleEvent::relation_added(
            "blog.Article",
            "1",
            "tags",
            vec![RelatedRecord::new("3").with_repr("rust")],
        ));
        let outcome = tracker.handle(LifecycleEvent::relation_removed(
            "blog.Article",
            "1",
            "views",
            vec![RelatedRecord::new("3")],
        ));
        assert_eq!(
            outcome,
            DispatchOutcome::Suppressed(SuppressReason::FieldNotTracked)
        );

        let entries = store.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), Action::RelationAdd);
        assert_eq!(
            serde_json::to_value(entries[0].changes()).unwrap(),
            json!({"tags": {"type": "m2m", "operation": "add", "objects": ["rust"], "pks": ["3"]}})
        );
    }

    #[test]
    fn test_full_state_attached() {
        let (tracker, store) = setup_with(
            TrackedEntityConfig::builder()
                .mask(["ssn"])
                .serialize_full_state(true)
                .build(),
        );
        tracker.handle(LifecycleEvent::delete("blog.Article", "1", article("Hi", 4)));
        let entry = &store.all().unwrap()[0];
        let state = entry.serialized_data().unwrap();
        assert_eq!(state.get("ssn"), Some(&json!("*****5-6789")));
        assert_eq!(state.get("views"), Some(&json!(4)));
    }

    #[test]
    fn test_global_masker_applies() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Article", TrackedEntityConfig::builder().mask(["ssn"]).build())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone())
            .engine(DiffEngine::new().with_global_masker(Masker::full()))
            .build();

        tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        assert_eq!(
            store.all().unwrap()[0].changes().get("ssn"),
            Some(&ChangeValue::Field(json!(null), json!("***********")))
        );
    }

    #[test]
    fn test_request_context_stamped() {
        let (tracker, store) = setup();
        let boundary = RequestBoundary::new(CidResolver::new());
        let request = RequestInfo::new()
            .header("X-Correlation-ID", "req-5")
            .header("X-Forwarded-For", "198.51.100.4")
            .actor(Actor::new("2"));

        {
            let _scope = boundary.begin(&request);
            tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        }
        tracker.handle(LifecycleEvent::create("blog.Article", "2", article("Hi", 0)));

        let entries = store.all().unwrap();
        assert_eq!(entries[0].cid(), Some("req-5"));
        assert_eq!(entries[0].remote_addr().unwrap().to_string(), "198.51.100.4");
        assert_eq!(entries[0].actor().unwrap().id, "2");
        assert_eq!(entries[1].cid(), None);
        assert!(entries[1].actor().is_none());
    }

    #[test]
    fn test_cid_not_stored_when_disabled() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Article", TrackedEntityConfig::default())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone())
            .cid(CidResolver::disabled())
            .build();

        let _cid = context::set_cid(Some("req-1".to_string()));
        tracker.handle(LifecycleEvent::create("blog.Article", "1", article("Hi", 0)));
        assert_eq!(store.all().unwrap()[0].cid(), None);
    }

    #[test]
    fn test_generated_cid_shared_within_unit() {
        let registry = Arc::new(Registry::new());
        registry
            .register("blog.Article", TrackedEntityConfig::default())
            .unwrap();
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::builder(registry, catalog(), store.clone())
            .cid(CidResolver::new().uuid_generator())
            .build();

        tracker.handle(LifecycleEvent::create("blog.Article", "1", article("A", 0)));
        tracker.handle(LifecycleEvent::create("blog.Article", "2", article("B", 0)));
        context::sync_scope(AmbientContext::default(), || {
            tracker.handle(LifecycleEvent::create("blog.Article", "3", article("C", 0)));
        });

        let entries = store.all().unwrap();
        assert!(entries[0].cid().is_some());
        assert_eq!(entries[0].cid(), entries[1].cid());
        assert!(entries[2].cid().is_some());
        assert_ne!(entries[2].cid(), entries[0].cid());
    }

    #[test]
    fn test_create_with_empty_changes_still_emits() {
        let (tracker, store) =
            setup_with(TrackedEntityConfig::builder().include(["views"]).build());
        let outcome = tracker.handle(LifecycleEvent::create(
            "blog.Article",
            "1",
            Snapshot::new().with("title", "Hi").with("views", Option::<i64>::None),
        ));

        assert!(outcome.entry_id().is_some());
        let entries = store.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), Action::Create);
        assert!(entries[0].changes().is_empty());
    }

    #[test]
    fn test_delete_with_empty_changes_still_emits() {
        let (tracker, store) =
            setup_with(TrackedEntityConfig::builder().include(["views"]).build());
        let outcome = tracker.handle(LifecycleEvent::delete(
            "blog.Article",
            "1",
            Snapshot::new().with("title", "Gone"),
        ));

        assert!(outcome.entry_id().is_some());
        let entries = store.all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action(), Action::Delete);
        assert!(entries[0].changes().is_empty());
        assert_eq!(entries[0].summary(), "Deleted Gone");
    }

    #[test]
    fn test_global_registry_tracker() {
        let entity = EntityType::from("dispatch.GlobalArticle");
        Registry::global()
            .register(entity.clone(), TrackedEntityConfig::default())
            .unwrap();
        let catalog = Arc::new(StaticCatalog::new().entity(
            "dispatch.GlobalArticle",
            [FieldMeta::new("title", FieldKind::Text)],
        ));
        let store = Arc::new(MemoryStore::new());
        let tracker = ChangeTracker::with_global_registry(catalog, store.clone()).build();

        let outcome = tracker.handle(LifecycleEvent::create(
            "dispatch.GlobalArticle",
            "1",
            Snapshot::new().with("title", "Hi"),
        ));
        assert!(outcome.entry_id().is_some());
        assert!(Arc::ptr_eq(tracker.registry(), &Registry::global()));
        Registry::global().unregister(&entity).unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_tasks_keep_their_actor() {
        let (tracker, store) = setup();
        let tracker = Arc::new(tracker);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                let ctx = AmbientContext {
                    actor: Some(Actor::new(format!("user-{}", i))),
                    ..AmbientContext::default()
                };
                tokio::spawn(context::scope_with(ctx, async move {
                    tokio::task::yield_now().await;
                    tracker.handle(LifecycleEvent::create(
                        "blog.Article",
                        i.to_string(),
                        article("Hi", i),
                    ))
                }))
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().entry_id().is_some());
        }

        for entry in store.all().unwrap() {
            assert_eq!(
                entry.actor().unwrap().id,
                format!("user-{}", entry.object_pk())
            );
        }
    }

    #[test]
    fn test_partial_update_fields() {
        let (tracker, store) = setup();
        tracker.handle(
            LifecycleEvent::update("blog.Article", "1", article("A", 1), article("B", 2))
                .only_fields(["views"]),
        );
        let entry = &store.all().unwrap()[0];
        assert_eq!(entry.changes().keys().collect::<Vec<_>>(), ["views"]);
    }
}
