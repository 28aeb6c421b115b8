//! Lifetime scopes for streaming fields.
//!
//! A [`Scope`] owns a set of fields and releases all of them when it is
//! closed. Scopes nest through a [`ScopeStack`]: the most recently
//! opened live scope is the *current* one, and fields created without
//! an explicit scope register there.
//!
//! ```text
//!   ScopeStack (one per thread, or an explicit value)
//!   ┌──────────┐
//!   │ S3       │  ← current: newest scope that is not closed
//!   │ S2       │
//!   │ S1       │
//!   └──────────┘
//!   close_scope(S2) → release S3, then S2; S1 stays current
//! ```
//!
//! Scopes are cheap handles: clones share one member set, so a scope can
//! be handed across threads even though each thread's stack is private.
//! Registering and closing are serialized by the scope's own lock.
//! Releasing the members happens outside that lock, so a slow store
//! release never blocks a concurrent `register`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::ReleaseError;
use crate::field::StreamingField;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

// ── Scope ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    id: u64,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    closed: bool,
    members: HashMap<usize, Arc<dyn StreamingField>>,
}

fn member_key(field: &Arc<dyn StreamingField>) -> usize {
    Arc::as_ptr(field).cast::<()>() as usize
}

impl Scope {
    /// A new open scope that is not on any stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(ScopeState::default()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Add `field` to this scope and hand it back.
    ///
    /// Registering the same field twice keeps one entry. Registering into
    /// a scope that is already closed releases the field immediately, so
    /// it cannot outlive the scope it was meant for.
    pub fn register<F: StreamingField + 'static>(&self, field: Arc<F>) -> Arc<F> {
        self.register_dyn(Arc::clone(&field) as Arc<dyn StreamingField>);
        field
    }

    /// [`register`](Self::register) for an already type-erased field.
    pub fn register_dyn(&self, field: Arc<dyn StreamingField>) {
        let key = member_key(&field);
        let mut state = self.inner.state.lock();
        if state.closed {
            drop(state);
            warn!(
                scope = self.id(),
                kind = %field.kind(),
                "registering into a closed scope; releasing field"
            );
            if let Err(e) = field.close() {
                warn!(scope = self.id(), error = %e, "failed to release field");
            }
            return;
        }
        state.members.entry(key).or_insert(field);
    }

    /// Whether `field` is a member.
    #[must_use]
    pub fn contains<F: StreamingField + 'static>(&self, field: &Arc<F>) -> bool {
        let key = Arc::as_ptr(field).cast::<()>() as usize;
        self.inner.state.lock().members.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Close this scope through the calling thread's stack.
    ///
    /// Scopes opened above it on that stack are closed first. A scope
    /// that is not on the stack just releases its own members.
    ///
    /// # Errors
    ///
    /// Every release failure, gathered into one [`ReleaseError`].
    pub fn close(&self) -> Result<(), ReleaseError> {
        close_scope(self)
    }

    /// Mark closed and release every member. Idempotent.
    fn release(&self) -> ReleaseError {
        let members = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return ReleaseError::default();
            }
            state.closed = true;
            std::mem::take(&mut state.members)
        };

        let mut report = ReleaseError::default();
        for field in members.into_values() {
            let result = field.close();
            if let Err(e) = &result {
                warn!(scope = self.id(), kind = %field.kind(), error = %e, "failed to release field");
            }
            report.record(result);
        }
        debug!(
            scope = self.id(),
            released = report.attempted - report.failures.len(),
            failed = report.failures.len(),
            "scope closed"
        );
        report
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("closed", &state.closed)
            .field("members", &state.members.len())
            .finish()
    }
}

// ── Stack ──────────────────────────────────────────────────────────────

/// Nesting order of scopes. The top live entry is the current scope.
#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new scope and make it current.
    pub fn create_scope(&mut self) -> Scope {
        self.prune();
        let scope = Scope::new();
        self.scopes.push(scope.clone());
        debug!(scope = scope.id(), depth = self.scopes.len(), "scope opened");
        scope
    }

    /// The newest scope that is still open.
    ///
    /// Scopes closed from elsewhere (another stack, another thread, or
    /// [`Scope::close`]) are dropped from the stack on the way.
    pub fn current(&mut self) -> Option<Scope> {
        self.prune();
        self.scopes.last().cloned()
    }

    /// The current scope, or a newly opened one if there is none.
    pub fn current_or_new(&mut self) -> Scope {
        match self.current() {
            Some(scope) => scope,
            None => self.create_scope(),
        }
    }

    /// Scopes on the stack. Entries closed from elsewhere count until
    /// the next call that touches the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn prune(&mut self) {
        let before = self.scopes.len();
        self.scopes.retain(|s| !s.is_closed());
        if self.scopes.len() < before {
            debug!(
                pruned = before - self.scopes.len(),
                depth = self.scopes.len(),
                "dropped closed scopes"
            );
        }
    }

    /// Close `scope` together with every scope opened above it.
    ///
    /// Inner scopes are released before the scope that encloses them.
    /// All occurrences of `scope` leave the stack. Closing a scope that
    /// is already closed, or not on this stack, is allowed.
    ///
    /// # Errors
    ///
    /// Every release failure, gathered into one [`ReleaseError`]. All
    /// releases are attempted regardless.
    pub fn close_scope(&mut self, scope: &Scope) -> Result<(), ReleaseError> {
        release_in_order(&self.detach(scope))
    }

    /// Close every scope on the stack, newest first, and empty it.
    ///
    /// # Errors
    ///
    /// Every release failure, gathered into one [`ReleaseError`].
    pub fn close_all(&mut self) -> Result<(), ReleaseError> {
        release_in_order(&self.detach_all())
    }

    /// Remove `scope` and its nested scopes; return them in release order.
    fn detach(&mut self, scope: &Scope) -> Vec<Scope> {
        let mut order = Vec::new();
        if let Some(pos) = self.scopes.iter().position(|s| s == scope) {
            order.extend(self.scopes.drain(pos + 1..).rev());
        }
        self.scopes.retain(|s| s != scope);
        order.retain(|s| s != scope);
        order.push(scope.clone());
        order
    }

    fn detach_all(&mut self) -> Vec<Scope> {
        self.prune();
        let mut order: Vec<Scope> = self.scopes.drain(..).rev().collect();
        let mut seen = Vec::with_capacity(order.len());
        order.retain(|s| {
            if seen.contains(s) {
                false
            } else {
                seen.push(s.clone());
                true
            }
        });
        order
    }
}

fn release_in_order(scopes: &[Scope]) -> Result<(), ReleaseError> {
    let mut report = ReleaseError::default();
    for scope in scopes {
        report.merge(scope.release());
    }
    report.into_result()
}

// ── Thread-local registry ──────────────────────────────────────────────

thread_local! {
    static STACK: RefCell<ScopeStack> = RefCell::new(ScopeStack::new());
}

/// Open a scope on this thread's stack and make it current.
#[must_use]
pub fn create_scope() -> Scope {
    STACK.with_borrow_mut(ScopeStack::create_scope)
}

/// This thread's current scope.
#[must_use]
pub fn current_scope() -> Option<Scope> {
    STACK.with_borrow_mut(ScopeStack::current)
}

/// This thread's current scope, opening one if there is none.
#[must_use]
pub fn current_or_new_scope() -> Scope {
    STACK.with_borrow_mut(ScopeStack::current_or_new)
}

/// Close `scope` and the scopes nested above it on this thread's stack.
///
/// # Errors
///
/// Every release failure, gathered into one [`ReleaseError`].
pub fn close_scope(scope: &Scope) -> Result<(), ReleaseError> {
    // Detach under the borrow, release after it: a field's release must
    // be free to touch the registry.
    let order = STACK.with_borrow_mut(|stack| stack.detach(scope));
    release_in_order(&order)
}

/// Close every scope on this thread's stack.
///
/// # Errors
///
/// Every release failure, gathered into one [`ReleaseError`].
pub fn close_all() -> Result<(), ReleaseError> {
    let order = STACK.with_borrow_mut(ScopeStack::detach_all);
    release_in_order(&order)
}

/// Register `field` in this thread's current scope, if there is one.
pub fn register_current<F: StreamingField + 'static>(field: Arc<F>) -> Arc<F> {
    match current_scope() {
        Some(scope) => scope.register(field),
        None => field,
    }
}

// ── Guard ──────────────────────────────────────────────────────────────

/// A thread-local scope closed when the guard drops.
///
/// Use [`close`](ScopeGuard::close) to observe release errors; on drop
/// they are only logged.
#[derive(Debug)]
pub struct ScopeGuard {
    scope: Scope,
    closed: bool,
}

impl ScopeGuard {
    /// Open a scope on this thread's stack.
    #[must_use]
    pub fn enter() -> Self {
        Self {
            scope: create_scope(),
            closed: false,
        }
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// # Errors
    ///
    /// Every release failure, gathered into one [`ReleaseError`].
    pub fn close(mut self) -> Result<(), ReleaseError> {
        self.closed = true;
        close_scope(&self.scope)
    }
}

impl Deref for ScopeGuard {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = close_scope(&self.scope) {
                warn!(scope = self.scope.id(), error = %e, "scope guard release failed");
            }
        }
    }
}
