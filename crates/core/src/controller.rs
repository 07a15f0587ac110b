use crate::backend::InstanceBackend;
use crate::error::{ActionError, ConsoleError, ConsoleResult};
use crate::labels;
use crate::lifecycle::Action;
use crate::model::{CreateInstanceParams, Instance};
use crate::store::{ActionGuard, InstanceStore};
use crate::validation;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turns user intents into backend calls, one in flight per instance.
pub struct LifecycleController<B: ?Sized> {
    backend: Arc<B>,
    store: Arc<InstanceStore>,
}

impl<B: ?Sized> Clone for LifecycleController<B> {
    fn clone(&self) -> Self {
        LifecycleController {
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
        }
    }
}

impl<B: ?Sized> LifecycleController<B> {
    pub fn new(backend: Arc<B>, store: Arc<InstanceStore>) -> Self {
        LifecycleController { backend, store }
    }

    pub fn store(&self) -> &Arc<InstanceStore> {
        &self.store
    }
}

impl<B: InstanceBackend + ?Sized> LifecycleController<B> {

    /// Validate the form locally, then ask the backend to launch the instance.
    pub async fn create(&self, params: CreateInstanceParams) -> ConsoleResult<Instance> {
        validation::validate_create_instance(&params)?;

        self.store.set_error(None);
        match self.backend.create_instance(&params).await {
            Ok(instance) => {
                info!(instance = %instance.id, name = %instance.name, "instance created");
                self.store.upsert(instance.clone());
                Ok(instance)
            }
            Err(e) => {
                warn!("create instance failed: {}", e);
                if !e.is_auth() {
                    self.store.set_error(Some(labels::CREATE_FAILURE.to_string()));
                }
                Err(e)
            }
        }
    }

    pub async fn start(&self, id: &str) -> ConsoleResult<Instance> {
        let guard = self.begin(id, Action::Start)?;
        let result = self.backend.start_instance(id).await;
        self.finish_transition(guard, result)
    }

    pub async fn stop(&self, id: &str) -> ConsoleResult<Instance> {
        let guard = self.begin(id, Action::Stop)?;
        let result = self.backend.stop_instance(id).await;
        self.finish_transition(guard, result)
    }

    /// Check that `id` may be terminated, without issuing anything.
    ///
    /// The request is only sent once the returned confirmation is confirmed.
    pub fn prepare_terminate(&self, id: &str) -> ConsoleResult<TerminateConfirmation<B>> {
        let instance = self
            .store
            .get(id)
            .ok_or_else(|| ActionError::UnknownInstance { id: id.to_string() })?;
        if self.store.in_flight(id).is_some() {
            return Err(ActionError::InProgress { id: id.to_string() }.into());
        }
        if let Err(e) = Action::Terminate.check(&instance) {
            self.store.set_error(Some(e.localized()));
            return Err(e.into());
        }
        Ok(TerminateConfirmation {
            controller: self.clone(),
            instance,
        })
    }

    pub async fn associate_elastic_ip(&self, id: &str) -> ConsoleResult<Instance> {
        let guard = self.begin(id, Action::AssociateElasticIp)?;
        let result = self.backend.associate_elastic_ip(id).await;
        self.finish_replacement(guard, result)
    }

    /// Release `allocation_id` from `id`. It must be the allocation bound right now.
    pub async fn disassociate_elastic_ip(&self, id: &str, allocation_id: &str) -> ConsoleResult<Instance> {
        let guard = match self.store.begin_disassociate(id, allocation_id) {
            Ok(guard) => guard,
            Err(e) => return Err(self.refuse(e)),
        };
        let result = self.backend.disassociate_elastic_ip(id, allocation_id).await;
        self.finish_replacement(guard, result)
    }

    fn begin(&self, id: &str, action: Action) -> ConsoleResult<ActionGuard> {
        self.store
            .begin_action(id, action)
            .map_err(|e| self.refuse(e))
    }

    /// A locally refused action issues nothing; a repeated click is not worth a banner.
    fn refuse(&self, err: ActionError) -> ConsoleError {
        match &err {
            ActionError::InProgress { id } => {
                debug!(instance = %id, "ignoring action while another is in flight");
            }
            _ => self.store.set_error(Some(err.localized())),
        }
        err.into()
    }

    fn finish_transition(&self, guard: ActionGuard, result: ConsoleResult<()>) -> ConsoleResult<Instance> {
        let id = guard.id().to_string();
        let action = guard.action();
        match result {
            Ok(()) => {
                info!(instance = %id, %action, "action accepted");
                guard.commit();
                self.store.set_error(None);
                self.store
                    .get(&id)
                    .ok_or_else(|| ActionError::UnknownInstance { id }.into())
            }
            Err(e) => Err(self.fail(guard, e)),
        }
    }

    fn finish_replacement(&self, guard: ActionGuard, result: ConsoleResult<Instance>) -> ConsoleResult<Instance> {
        match result {
            Ok(instance) => {
                info!(instance = %instance.id, action = %guard.action(), "action accepted");
                guard.commit_with(instance.clone());
                self.store.set_error(None);
                Ok(instance)
            }
            Err(e) => Err(self.fail(guard, e)),
        }
    }

    fn fail(&self, guard: ActionGuard, err: ConsoleError) -> ConsoleError {
        let action = guard.action();
        warn!(instance = %guard.id(), %action, "action failed: {}", err);
        guard.rollback();
        if !err.is_auth() {
            self.store.set_error(Some(action.failure_message().to_string()));
        }
        err.into_action_error(action)
    }
}

/// A terminate request waiting for the user's explicit confirmation.
pub struct TerminateConfirmation<B: ?Sized> {
    controller: LifecycleController<B>,
    instance: Instance,
}

impl<B: InstanceBackend + ?Sized> TerminateConfirmation<B> {
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub async fn confirm(self) -> ConsoleResult<Instance> {
        let controller = self.controller;
        let id = self.instance.id;
        let guard = controller.begin(&id, Action::Terminate)?;
        let result = controller.backend.terminate_instance(&id).await;
        controller.finish_transition(guard, result)
    }

    /// Back out. Nothing was sent.
    pub fn cancel(self) {
        debug!(instance = %self.instance.id, "terminate cancelled");
    }
}
