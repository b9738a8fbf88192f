//! Observable handle for one resolution.

use tokio::sync::watch;

use super::Resolver;
use crate::types::{LoadingState, ResolveOptions, ResourceRef};

/// One resolution of one [`ResourceRef`], with observable state.
///
/// The state starts at [`LoadingState::Idle`], becomes `Loading` when
/// [`load`](Self::load) is first called, and ends at `Success` or `Failure`.
/// It never leaves a terminal state, and calling `load` again (or
/// concurrently) does not start a second run. An abandoned run returns
/// the handle to `Idle`.
///
/// ```rust,no_run
/// # async fn example(resolver: huginn::Resolver) {
/// use huginn::{ResolveOptions, ResourceRef};
///
/// let resolution = resolver.resolution(ResourceRef::id("abc"), ResolveOptions::with_retry());
/// let mut updates = resolution.subscribe();
/// tokio::spawn(async move {
///     while updates.changed().await.is_ok() {
///         println!("{:?}", *updates.borrow());
///     }
/// });
/// let state = resolution.load().await;
/// # }
/// ```
pub struct Resolution {
    resolver: Resolver,
    source: ResourceRef,
    options: ResolveOptions,
    state: watch::Sender<LoadingState>,
}

impl Resolution {
    pub(super) fn new(resolver: Resolver, source: ResourceRef, options: ResolveOptions) -> Self {
        Self {
            resolver,
            source,
            options,
            state: watch::Sender::new(LoadingState::Idle),
        }
    }

    pub fn source(&self) -> &ResourceRef {
        &self.source
    }

    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LoadingState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<LoadingState> {
        self.state.subscribe()
    }

    /// Run the resolution and return its terminal state.
    ///
    /// If this handle is not `Idle`, returns the current state without
    /// doing anything. Dropping the returned future before it completes
    /// resets the handle to `Idle`, so a later `load` starts over.
    pub async fn load(&self) -> LoadingState {
        let started = self.state.send_if_modified(|state| {
            if matches!(state, LoadingState::Idle) {
                *state = LoadingState::Loading { progress: None };
                true
            } else {
                false
            }
        });
        if !started {
            return self.state();
        }

        let mut guard = ResetOnDrop(Some(&self.state));
        let terminal = self.resolver.run(&self.source, self.options).await;
        guard.0 = None;
        self.state.send_replace(terminal.clone());
        terminal
    }
}

/// Puts the handle back to `Idle` when a `load` future is dropped mid-run.
struct ResetOnDrop<'a>(Option<&'a watch::Sender<LoadingState>>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(state) = self.0.take() {
            state.send_replace(LoadingState::Idle);
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("source", &self.source)
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
