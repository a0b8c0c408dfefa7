//! Ambient context for log entries
//!
//! Actor, correlation id, remote address and the disable flag travel with
//! the current execution unit instead of being passed to every call. Inside
//! a task started with [`scope`] or [`scope_with`] the state is task-local,
//! so it follows the task across worker threads. Outside any such scope it
//! falls back to thread-local state.
//!
//! Every setter returns a [`ContextGuard`] that restores the previous value
//! when it ends. Guards must end in reverse order of creation; ending one
//! out of order is reported as a [`ContextScopeError`].
//!
//! # Example
//!
//! ```rust,ignore
//! let _actor = context::set_actor(Actor::new("42"));
//! {
//!     let _quiet = context::disable();
//!     tracker.handle(event); // suppressed
//! }
//! tracker.handle(event); // logged with actor 42
//! ```

pub mod cid;
pub mod request;

pub use cid::{CidResolver, DEFAULT_CID_HEADER};
pub use request::{RequestBoundary, RequestInfo, RequestScope};

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ContextScopeError;
use crate::models::{Actor, RemoteAddr};

/// Snapshot of the ambient values visible to the dispatcher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    pub actor: Option<Actor>,
    pub cid: Option<String>,
    pub remote_addr: Option<RemoteAddr>,
    pub disabled: bool,
}

#[derive(Debug, Default)]
struct ScopeState {
    ambient: AmbientContext,
    open: Vec<u64>,
}

impl ScopeState {
    fn root(ambient: AmbientContext) -> Self {
        Self {
            ambient,
            open: Vec::new(),
        }
    }
}

thread_local! {
    static THREAD_STATE: RefCell<ScopeState> = RefCell::new(ScopeState::default());
}

tokio::task_local! {
    static TASK_STATE: RefCell<ScopeState>;
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

fn with_state<R>(f: impl FnOnce(&mut ScopeState) -> R) -> R {
    if TASK_STATE.try_with(|_| ()).is_ok() {
        TASK_STATE.with(|cell| f(&mut cell.borrow_mut()))
    } else {
        THREAD_STATE.with(|cell| f(&mut cell.borrow_mut()))
    }
}

#[derive(Debug)]
enum Restore {
    Actor(Option<Actor>),
    Cid(Option<String>),
    RemoteAddr(Option<RemoteAddr>),
    Disabled(bool),
    All(AmbientContext),
}

impl Restore {
    fn apply(self, ambient: &mut AmbientContext) {
        match self {
            Restore::Actor(actor) => ambient.actor = actor,
            Restore::Cid(cid) => ambient.cid = cid,
            Restore::RemoteAddr(addr) => ambient.remote_addr = addr,
            Restore::Disabled(disabled) => ambient.disabled = disabled,
            Restore::All(previous) => *ambient = previous,
        }
    }
}

/// Restores the previous ambient value when the scope ends
///
/// Dropping the guard ends the scope. Dropping guards out of order panics
/// unless the thread is already unwinding; use [`ContextGuard::close`] to
/// get the error as a value instead.
#[must_use = "the scope ends as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ContextGuard {
    id: u64,
    restore: Option<Restore>,
}

fn open(apply: impl FnOnce(&mut AmbientContext) -> Restore) -> ContextGuard {
    let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
    with_state(|state| {
        let restore = apply(&mut state.ambient);
        state.open.push(id);
        ContextGuard {
            id,
            restore: Some(restore),
        }
    })
}

impl ContextGuard {
    /// End the scope now, reporting misuse instead of panicking
    pub fn close(mut self) -> Result<(), ContextScopeError> {
        self.finish()
    }

    fn finish(&mut self) -> Result<(), ContextScopeError> {
        let Some(restore) = self.restore.take() else {
            return Ok(());
        };
        let id = self.id;
        with_state(|state| {
            match state.open.last().copied() {
                Some(top) if top == id => {}
                Some(top) if state.open.contains(&id) => {
                    state.open.retain(|&open| open != id);
                    return Err(ContextScopeError::OutOfOrder {
                        closing: id,
                        innermost: top,
                    })
                }
                _ => return Err(ContextScopeError::NotOpen(id)),
            }
            state.open.pop();
            restore.apply(&mut state.ambient);
            Ok(())
        })
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            if std::thread::panicking() {
                tracing::error!(%err, "context scope ended out of order while unwinding");
            } else {
                panic!("context scope misuse: {}", err);
            }
        }
    }
}

/// Set the actor for the duration of the returned scope
pub fn set_actor(actor: impl Into<Option<Actor>>) -> ContextGuard {
    let actor = actor.into();
    open(|ambient| Restore::Actor(std::mem::replace(&mut ambient.actor, actor)))
}

pub fn set_cid(cid: impl Into<Option<String>>) -> ContextGuard {
    let cid = cid.into();
    open(|ambient| Restore::Cid(std::mem::replace(&mut ambient.cid, cid)))
}

pub fn set_remote_addr(addr: impl Into<Option<RemoteAddr>>) -> ContextGuard {
    let addr = addr.into();
    open(|ambient| Restore::RemoteAddr(std::mem::replace(&mut ambient.remote_addr, addr)))
}

/// Suppress all logging until the returned scope ends
pub fn disable() -> ContextGuard {
    open(|ambient| Restore::Disabled(std::mem::replace(&mut ambient.disabled, true)))
}

/// Replace the whole ambient context for the returned scope
///
/// A disabled ancestor stays in force: entering a context with
/// `disabled: false` inside a disabled scope does not re-enable logging.
pub fn enter(context: AmbientContext) -> ContextGuard {
    open(|ambient| {
        let disabled = ambient.disabled || context.disabled;
        let previous = std::mem::replace(ambient, context);
        ambient.disabled = disabled;
        Restore::All(previous)
    })
}

/// Copy of the ambient context of the current execution unit
pub fn current() -> AmbientContext {
    with_state(|state| state.ambient.clone())
}

pub fn current_actor() -> Option<Actor> {
    with_state(|state| state.ambient.actor.clone())
}

pub fn current_cid() -> Option<String> {
    with_state(|state| state.ambient.cid.clone())
}

/// The current correlation id, or the one produced by `make`, which is then
/// kept for the rest of the current execution unit. An enclosing
/// [`set_cid`] or [`enter`] scope drops it when it ends.
pub fn cid_or_insert_with(make: impl FnOnce() -> Option<String>) -> Option<String> {
    if let Some(cid) = current_cid() {
        return Some(cid);
    }
    let fresh = make()?;
    Some(with_state(|state| state.ambient.cid.get_or_insert(fresh).clone()))
}

pub fn current_remote_addr() -> Option<RemoteAddr> {
    with_state(|state| state.ambient.remote_addr)
}

pub fn is_disabled() -> bool {
    with_state(|state| state.ambient.disabled)
}

/// Run a future with its own task-local context, seeded from the caller's
/// current context at the time of this call
pub fn scope<F: Future>(future: F) -> impl Future<Output = F::Output> {
    scope_with(current(), future)
}

/// Run a future with its own task-local context seeded from `context`
pub fn scope_with<F: Future>(
    context: AmbientContext,
    future: F,
) -> impl Future<Output = F::Output> {
    TASK_STATE.scope(RefCell::new(ScopeState::root(context)), future)
}

/// Run a closure with its own context seeded from `context`, for work
/// handed to another thread
pub fn sync_scope<R>(context: AmbientContext, f: impl FnOnce() -> R) -> R {
    TASK_STATE.sync_scope(RefCell::new(ScopeState::root(context)), f)
}
