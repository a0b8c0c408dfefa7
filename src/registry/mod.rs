//! Registry of tracked entity types
//!
//! Reads happen on every lifecycle event and never block: the table is an
//! immutable map behind `ArcSwap`, replaced wholesale by writers. Writers
//! serialize among themselves so two concurrent registrations cannot lose
//! each other's update.

mod config;

pub use config::{TrackedEntityConfig, TrackedEntityConfigBuilder};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use arc_swap::ArcSwap;

use crate::audit::Action;
use crate::error::ConfigError;
use crate::models::{EntityType, FieldCatalog};

/// Which kinds of lifecycle events produce entries at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSet {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub access: bool,
    pub relations: bool,
}

impl ActionSet {
    pub fn all() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            access: true,
            relations: true,
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Delete => self.delete,
            Action::Access => self.access,
            Action::RelationAdd | Action::RelationRemove => self.relations,
        }
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Inputs of the track-all policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalPolicy {
    pub include_all: bool,
    /// Entity names or application labels never tracked by the policy
    pub deny_list: Vec<String>,
    pub global_exclude_fields: Vec<String>,
    pub global_mask_fields: Vec<String>,
}

impl GlobalPolicy {
    pub fn denies(&self, entity_type: &EntityType) -> bool {
        self.deny_list
            .iter()
            .any(|pattern| entity_type.matches_pattern(pattern))
    }

    /// Configuration given to types registered by the policy
    pub fn derived_config(&self) -> TrackedEntityConfig {
        TrackedEntityConfig::builder()
            .exclude(self.global_exclude_fields.iter().cloned())
            .mask(self.global_mask_fields.iter().cloned())
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Derived,
    Explicit,
}

#[derive(Debug, Clone)]
struct Registration {
    config: Arc<TrackedEntityConfig>,
    origin: Origin,
}

type Table = HashMap<EntityType, Registration>;

/// Mapping from entity type to its tracking configuration
#[derive(Debug)]
pub struct Registry {
    table: ArcSwap<Table>,
    writer: Mutex<()>,
    actions: ActionSet,
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_actions(ActionSet::all())
    }

    pub fn with_actions(actions: ActionSet) -> Self {
        Self {
            table: ArcSwap::from_pointee(Table::new()),
            writer: Mutex::new(()),
            actions,
        }
    }

    /// Process-wide registry, created empty on first use
    pub fn global() -> Arc<Registry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    pub fn actions(&self) -> ActionSet {
        self.actions
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        // The guarded value is (), so a poisoned lock holds no broken state
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an entity type explicitly
    ///
    /// Replaces a configuration derived by the global policy; a second
    /// explicit registration is an error.
    pub fn register(
        &self,
        entity_type: impl Into<EntityType>,
        config: TrackedEntityConfig,
    ) -> Result<(), ConfigError> {
        let entity_type = entity_type.into();
        config.validate(&entity_type)?;

        let _writer = self.lock_writer();
        let current = self.table.load_full();
        if let Some(existing) = current.get(&entity_type) {
            if existing.origin == Origin::Explicit {
                return Err(ConfigError::AlreadyRegistered(entity_type.to_string()));
            }
        }

        let mut next = Table::clone(&current);
        next.insert(
            entity_type.clone(),
            Registration {
                config: Arc::new(config),
                origin: Origin::Explicit,
            },
        );
        self.table.store(Arc::new(next));
        tracing::info!(%entity_type, "registered entity type");
        Ok(())
    }

    pub fn unregister(&self, entity_type: &EntityType) -> Result<Arc<TrackedEntityConfig>, ConfigError> {
        let _writer = self.lock_writer();
        let current = self.table.load_full();
        let mut next = Table::clone(&current);
        let removed = next
            .remove(entity_type)
            .ok_or_else(|| ConfigError::NotRegistered(entity_type.to_string()))?;
        self.table.store(Arc::new(next));
        tracing::info!(%entity_type, "unregistered entity type");
        Ok(removed.config)
    }

    pub fn get_config(&self, entity_type: &EntityType) -> Option<Arc<TrackedEntityConfig>> {
        self.table
            .load()
            .get(entity_type)
            .map(|registration| Arc::clone(&registration.config))
    }

    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.table.load().contains_key(entity_type)
    }

    /// Whether the configuration came from the global policy
    pub fn is_derived(&self, entity_type: &EntityType) -> bool {
        self.table
            .load()
            .get(entity_type)
            .is_some_and(|registration| registration.origin == Origin::Derived)
    }

    /// Registered entity types, sorted
    pub fn entity_types(&self) -> Vec<EntityType> {
        let mut types: Vec<_> = self.table.load().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.table.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.load().is_empty()
    }

    /// Register every catalog type not denied and not already registered,
    /// returning how many were added. A disabled policy adds nothing.
    pub fn apply_global_policy(&self, catalog: &dyn FieldCatalog, policy: &GlobalPolicy) -> usize {
        if !policy.include_all {
            return 0;
        }

        let _writer = self.lock_writer();
        let current = self.table.load_full();
        let mut next = Table::clone(&current);
        let derived = Arc::new(policy.derived_config());
        let mut added = 0;

        for entity_type in catalog.entity_types() {
            if next.contains_key(&entity_type) || policy.denies(&entity_type) {
                continue;
            }
            next.insert(
                entity_type,
                Registration {
                    config: Arc::clone(&derived),
                    origin: Origin::Derived,
                },
            );
            added += 1;
        }

        if added > 0 {
            self.table.store(Arc::new(next));
        }
        tracing::info!(added, "applied global tracking policy");
        added
    }
}
