//! Pre-log and post-log observers
//!
//! Observer lists are copy-on-write: subscribing or unsubscribing swaps in
//! a new list, and dispatch iterates whichever list was current when it
//! started. Pre-log observers run in subscription order and the first veto
//! stops the rest.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::audit::{Action, ChangePayload, LogEntry};
use crate::error::TrackError;
use crate::models::{EntityType, SubscriptionId};

/// What a pre-log observer decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreLogDecision {
    Proceed,
    Veto,
}

/// Seen by pre-log observers before an entry is built
#[derive(Debug)]
pub struct PreLogEvent<'a> {
    pub entity_type: &'a EntityType,
    pub pk: &'a str,
    pub action: Action,
    pub changes: &'a ChangePayload,
}

/// Seen by post-log observers after an emit attempt or a failed diff
#[derive(Debug)]
pub struct PostLogEvent<'a> {
    pub entity_type: &'a EntityType,
    pub pk: &'a str,
    pub action: Action,
    pub changes: Option<&'a ChangePayload>,
    pub log_entry: Option<&'a LogEntry>,
    pub error: Option<&'a TrackError>,
}

impl PostLogEvent<'_> {
    pub fn log_created(&self) -> bool {
        self.log_entry.is_some()
    }
}

pub trait PreLogObserver: Send + Sync {
    fn pre_log(&self, event: &PreLogEvent<'_>) -> PreLogDecision;
}

pub trait PostLogObserver: Send + Sync {
    fn post_log(&self, event: &PostLogEvent<'_>);
}

impl<F> PreLogObserver for F
where
    F: Fn(&PreLogEvent<'_>) -> PreLogDecision + Send + Sync,
{
    fn pre_log(&self, event: &PreLogEvent<'_>) -> PreLogDecision {
        self(event)
    }
}

impl<F> PostLogObserver for F
where
    F: Fn(&PostLogEvent<'_>) + Send + Sync,
{
    fn post_log(&self, event: &PostLogEvent<'_>) {
        self(event)
    }
}

type Subscribers<T> = Vec<(SubscriptionId, Arc<T>)>;

/// Subscriber lists for both hook points
pub struct LogHooks {
    pre: ArcSwap<Subscribers<dyn PreLogObserver>>,
    post: ArcSwap<Subscribers<dyn PostLogObserver>>,
}

impl Default for LogHooks {
    fn default() -> Self {
        Self {
            pre: ArcSwap::from_pointee(Vec::new()),
            post: ArcSwap::from_pointee(Vec::new()),
        }
    }
}

impl std::fmt::Debug for LogHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHooks")
            .field("pre", &self.pre.load().len())
            .field("post", &self.post.load().len())
            .finish()
    }
}

impl LogHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_pre_log<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PreLogEvent<'_>) -> PreLogDecision + Send + Sync + 'static,
    {
        self.add_pre_log(Arc::new(observer))
    }

    pub fn subscribe_post_log<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&PostLogEvent<'_>) + Send + Sync + 'static,
    {
        self.add_post_log(Arc::new(observer))
    }

    pub fn add_pre_log(&self, observer: Arc<dyn PreLogObserver>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.pre.rcu(|current| {
            let mut next: Vec<_> = current.iter().cloned().collect();
            next.push((id, Arc::clone(&observer)));
            next
        });
        id
    }

    pub fn add_post_log(&self, observer: Arc<dyn PostLogObserver>) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.post.rcu(|current| {
            let mut next: Vec<_> = current.iter().cloned().collect();
            next.push((id, Arc::clone(&observer)));
            next
        });
        id
    }

    /// Remove a subscription from whichever list holds it
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let previous = self.pre.rcu(|current| without(current, id));
        if previous.iter().any(|(sid, _)| *sid == id) {
            return true;
        }
        let previous = self.post.rcu(|current| without(current, id));
        previous.iter().any(|(sid, _)| *sid == id)
    }

    pub fn pre_log_count(&self) -> usize {
        self.pre.load().len()
    }

    pub fn post_log_count(&self) -> usize {
        self.post.load().len()
    }

    /// Run pre-log observers in order until one vetoes
    pub fn run_pre_log(&self, event: &PreLogEvent<'_>) -> PreLogDecision {
        let observers = self.pre.load_full();
        for (id, observer) in observers.iter() {
            if observer.pre_log(event) == PreLogDecision::Veto {
                tracing::debug!(subscription = %id, "pre-log observer vetoed entry");
                return PreLogDecision::Veto;
            }
        }
        PreLogDecision::Proceed
    }

    pub fn run_post_log(&self, event: &PostLogEvent<'_>) {
        let observers = self.post.load_full();
        for (_, observer) in observers.iter() {
            observer.post_log(event);
        }
    }
}

fn without<T: ?Sized>(current: &Arc<Subscribers<T>>, id: SubscriptionId) -> Subscribers<T> {
    current
        .iter()
        .filter(|(sid, _)| *sid != id)
        .map(|(sid, observer)| (*sid, Arc::clone(observer)))
        .collect()
}
