//! View models: a store, a controller bound to it, and the poller that keeps it fresh.

use crate::backend::InstanceBackend;
use crate::config::ConsoleConfig;
use crate::controller::{LifecycleController, TerminateConfirmation};
use crate::error::ConsoleResult;
use crate::labels;
use crate::model::Instance;
use crate::poller::Poller;
use crate::store::InstanceStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Fetch the whole collection into `store`.
pub async fn refresh_list<B: InstanceBackend + ?Sized>(backend: &B, store: &InstanceStore) -> ConsoleResult<()> {
    store.set_loading(true);
    let result = backend.list_instances().await;
    store.set_loading(false);
    match result {
        Ok(instances) => {
            debug!("polled {} instances", instances.len());
            store.replace_all(instances);
            store.set_error(None);
            Ok(())
        }
        Err(e) => {
            warn!("failed to load instances: {}", e);
            if !e.is_auth() {
                store.set_error(Some(labels::LIST_LOAD_FAILURE.to_string()));
            }
            Err(e)
        }
    }
}

/// Fetch one instance into `store`.
pub async fn refresh_detail<B: InstanceBackend + ?Sized>(
    backend: &B,
    store: &InstanceStore,
    id: &str,
) -> ConsoleResult<()> {
    store.set_loading(true);
    let result = backend.get_instance(id).await;
    store.set_loading(false);
    match result {
        Ok(instance) => {
            debug!(instance = %id, state = %instance.state, "polled instance");
            store.replace_one(instance);
            store.set_error(None);
            Ok(())
        }
        Err(e) => {
            warn!(instance = %id, "failed to load instance: {}", e);
            if !e.is_auth() {
                store.set_error(Some(labels::DETAIL_LOAD_FAILURE.to_string()));
            }
            Err(e)
        }
    }
}

/// The instance list, refreshed on open and every `list_poll_interval`.
pub struct ListView<B: ?Sized> {
    controller: LifecycleController<B>,
    poller: Option<Poller>,
}

impl<B: InstanceBackend + ?Sized + 'static> ListView<B> {
    pub fn open(backend: Arc<B>, config: &ConsoleConfig) -> Self {
        let store = InstanceStore::new(config.terminated_retention);
        let poller = {
            let backend = Arc::clone(&backend);
            let store = Arc::clone(&store);
            Poller::spawn(config.list_poll_interval, move || {
                let backend = Arc::clone(&backend);
                let store = Arc::clone(&store);
                async move {
                    let _ = refresh_list(backend.as_ref(), &store).await;
                }
            })
        };
        ListView {
            controller: LifecycleController::new(backend, store),
            poller: Some(poller),
        }
    }

    pub fn controller(&self) -> &LifecycleController<B> {
        &self.controller
    }

    pub fn store(&self) -> &Arc<InstanceStore> {
        self.controller.store()
    }

    pub fn instances(&self) -> Vec<Instance> {
        self.store().visible_instances()
    }

    pub fn close(&mut self) {
        self.poller.take();
        self.store().close();
    }
}

impl<B: ?Sized> Drop for ListView<B> {
    fn drop(&mut self) {
        self.poller.take();
        self.controller.store().close();
    }
}

/// A single instance, refreshed on open and every `detail_poll_interval`.
pub struct DetailView<B: ?Sized> {
    id: String,
    controller: LifecycleController<B>,
    poller: Option<Poller>,
    grace: std::time::Duration,
    leave_at: watch::Sender<Option<Instant>>,
    loaded: Arc<watch::Sender<bool>>,
}

impl<B: InstanceBackend + ?Sized + 'static> DetailView<B> {
    pub fn open(backend: Arc<B>, id: impl Into<String>, config: &ConsoleConfig) -> Self {
        let id = id.into();
        let store = InstanceStore::new(config.terminated_retention);
        let (loaded, _) = watch::channel(false);
        let loaded = Arc::new(loaded);
        let poller = {
            let backend = Arc::clone(&backend);
            let store = Arc::clone(&store);
            let loaded = Arc::clone(&loaded);
            let id = id.clone();
            Poller::spawn(config.detail_poll_interval, move || {
                let backend = Arc::clone(&backend);
                let store = Arc::clone(&store);
                let loaded = Arc::clone(&loaded);
                let id = id.clone();
                async move {
                    let _ = refresh_detail(backend.as_ref(), &store, &id).await;
                    loaded.send_replace(true);
                }
            })
        };
        let (leave_at, _) = watch::channel(None);
        DetailView {
            id,
            controller: LifecycleController::new(backend, store),
            poller: Some(poller),
            grace: config.terminate_grace,
            leave_at,
            loaded,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn controller(&self) -> &LifecycleController<B> {
        &self.controller
    }

    pub fn store(&self) -> &Arc<InstanceStore> {
        self.controller.store()
    }

    pub fn instance(&self) -> Option<Instance> {
        self.store().get(&self.id)
    }

    /// Waits for the fetch made on open. `None` if it failed; the store error says why,
    /// unless the session was rejected.
    pub async fn first_load(&self) -> Option<Instance> {
        let mut rx = self.loaded.subscribe();
        if rx.wait_for(|done| *done).await.is_err() {
            return None;
        }
        self.instance()
    }

    pub fn prepare_terminate(&self) -> ConsoleResult<TerminateConfirmation<B>> {
        self.controller.prepare_terminate(&self.id)
    }

    /// Confirm a terminate and schedule leaving this view once the grace period has passed.
    pub async fn terminate(&self, confirmation: TerminateConfirmation<B>) -> ConsoleResult<Instance> {
        let instance = confirmation.confirm().await?;
        if !self.store().is_closed() {
            self.leave_at.send_replace(Some(Instant::now() + self.grace));
        }
        Ok(instance)
    }

    /// Resolves once the view should be left, after a terminate was accepted.
    pub async fn wait_for_exit(&self) {
        let mut rx = self.leave_at.subscribe();
        let deadline = loop {
            if let Some(deadline) = *rx.borrow_and_update() {
                break deadline;
            }
            if rx.changed().await.is_err() {
                return;
            }
        };
        tokio::time::sleep_until(deadline).await;
    }

    pub fn close(&mut self) {
        self.poller.take();
        self.store().close();
    }
}

impl<B: ?Sized> Drop for DetailView<B> {
    fn drop(&mut self) {
        self.poller.take();
        self.controller.store().close();
    }
}
