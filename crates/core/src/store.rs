use crate::error::ActionError;
use crate::lifecycle::Action;
use crate::model::{Instance, InstanceState};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

struct Slot {
    instance: Instance,
    in_flight: Option<Action>,
    terminated_at: Option<Instant>,
}

impl Slot {
    fn new(instance: Instance, now: Instant) -> Self {
        let terminated_at = (instance.state == InstanceState::Terminated).then_some(now);
        Slot {
            instance,
            in_flight: None,
            terminated_at,
        }
    }

    /// Take the server's record, remembering when it was first seen terminated.
    fn overwrite(&mut self, instance: Instance, now: Instant) {
        self.terminated_at = match instance.state {
            InstanceState::Terminated => self.terminated_at.or(Some(now)),
            _ => None,
        };
        self.instance = instance;
    }
}

#[derive(Default)]
struct StoreInner {
    slots: HashMap<String, Slot>,
    order: Vec<String>,
    loading: bool,
    error: Option<String>,
    closed: bool,
}

/// Last known instances for one view, keyed by id, plus that view's loading and error flags.
///
/// Once closed, every write is dropped: results that arrive after the view
/// went away must not be applied.
pub struct InstanceStore {
    inner: Mutex<StoreInner>,
    retention: Duration,
    changes: watch::Sender<u64>,
}

impl InstanceStore {
    pub fn new(retention: Duration) -> Arc<Self> {
        let (changes, _) = watch::channel(0);
        Arc::new(InstanceStore {
            inner: Mutex::new(StoreInner::default()),
            retention,
            changes,
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    /// Receives a new revision number after every applied change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Replace the whole collection with a polled result.
    ///
    /// Slots with an action in flight keep their local record, even when the
    /// poll no longer lists them.
    pub fn replace_all(&self, instances: Vec<Instance>) {
        let now = Instant::now();
        {
            let mut inner = self.lock();
            if inner.closed {
                debug!("store closed, discarding list of {} instances", instances.len());
                return;
            }

            let mut previous = std::mem::take(&mut inner.slots);
            let previous_order = std::mem::take(&mut inner.order);
            let mut slots = HashMap::with_capacity(instances.len());
            let mut order = Vec::with_capacity(instances.len());

            for instance in instances {
                let id = instance.id.clone();
                let slot = match previous.remove(&id) {
                    Some(slot) if slot.in_flight.is_some() => {
                        debug!(instance = %id, "action in flight, keeping local state over poll");
                        slot
                    }
                    Some(mut slot) => {
                        slot.overwrite(instance, now);
                        slot
                    }
                    None => Slot::new(instance, now),
                };
                if slots.insert(id.clone(), slot).is_none() {
                    order.push(id);
                }
            }

            for id in previous_order {
                if let Some(slot) = previous.remove(&id) {
                    if slot.in_flight.is_some() {
                        order.push(id.clone());
                        slots.insert(id, slot);
                    }
                }
            }

            inner.slots = slots;
            inner.order = order;
        }
        self.touch();
    }

    /// Apply a polled single record, same precedence rule as [`replace_all`](Self::replace_all).
    pub fn replace_one(&self, instance: Instance) {
        let now = Instant::now();
        {
            let mut inner = self.lock();
            if inner.closed {
                debug!(instance = %instance.id, "store closed, discarding polled record");
                return;
            }
            let id = instance.id.clone();
            match inner.slots.get_mut(&id) {
                Some(slot) if slot.in_flight.is_some() => {
                    debug!(instance = %id, "action in flight, keeping local state over poll");
                    return;
                }
                Some(slot) => slot.overwrite(instance, now),
                None => {
                    inner.slots.insert(id.clone(), Slot::new(instance, now));
                    inner.order.push(id);
                }
            }
        }
        self.touch();
    }

    /// Insert or overwrite a record the backend just returned, regardless of in-flight flags.
    pub fn upsert(&self, instance: Instance) {
        let now = Instant::now();
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            let id = instance.id.clone();
            match inner.slots.get_mut(&id) {
                Some(slot) => slot.overwrite(instance, now),
                None => {
                    inner.slots.insert(id.clone(), Slot::new(instance, now));
                    inner.order.push(id);
                }
            }
        }
        self.touch();
    }

    pub fn get(&self, id: &str) -> Option<Instance> {
        self.lock().slots.get(id).map(|slot| slot.instance.clone())
    }

    pub fn in_flight(&self, id: &str) -> Option<Action> {
        self.lock().slots.get(id).and_then(|slot| slot.in_flight)
    }

    /// All records in backend order.
    pub fn instances(&self) -> Vec<Instance> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.slots.get(id))
            .map(|slot| slot.instance.clone())
            .collect()
    }

    /// Records worth displaying: instances terminated for longer than the retention window are left out.
    pub fn visible_instances(&self) -> Vec<Instance> {
        let now = Instant::now();
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.slots.get(id))
            .filter(|slot| match slot.terminated_at {
                Some(at) => now.saturating_duration_since(at) < self.retention,
                None => true,
            })
            .map(|slot| slot.instance.clone())
            .collect()
    }

    /// Actions that may be issued right now. Empty while another action is in flight.
    pub fn available_actions(&self, id: &str) -> Vec<Action> {
        let inner = self.lock();
        match inner.slots.get(id) {
            Some(slot) if slot.in_flight.is_none() => slot.instance.available_actions(),
            _ => Vec::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn set_loading(&self, loading: bool) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.loading = loading;
        }
        self.touch();
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn set_error(&self, error: Option<String>) {
        {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.error = error;
        }
        self.touch();
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.touch();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Claim the instance for `action` and apply its optimistic state.
    ///
    /// Presence, the in-flight flag and legality are checked under one lock,
    /// so two concurrent callers can never both get a guard.
    pub fn begin_action(self: &Arc<Self>, id: &str, action: Action) -> Result<ActionGuard, ActionError> {
        self.begin(id, action, None)
    }

    /// Like [`begin_action`](Self::begin_action), additionally requiring that
    /// `allocation_id` is the allocation bound right now.
    pub fn begin_disassociate(
        self: &Arc<Self>,
        id: &str,
        allocation_id: &str,
    ) -> Result<ActionGuard, ActionError> {
        self.begin(id, Action::DisassociateElasticIp, Some(allocation_id))
    }

    fn begin(
        self: &Arc<Self>,
        id: &str,
        action: Action,
        allocation_id: Option<&str>,
    ) -> Result<ActionGuard, ActionError> {
        let previous = {
            let mut inner = self.lock();
            let slot = inner
                .slots
                .get_mut(id)
                .ok_or_else(|| ActionError::UnknownInstance { id: id.to_string() })?;

            if slot.in_flight.is_some() {
                return Err(ActionError::InProgress { id: id.to_string() });
            }
            action.check(&slot.instance)?;

            if let Some(requested) = allocation_id {
                let bound = slot.instance.bound_allocation().unwrap_or_default();
                if bound != requested {
                    return Err(ActionError::AllocationMismatch {
                        id: id.to_string(),
                        requested: requested.to_string(),
                        bound: bound.to_string(),
                    });
                }
            }

            let previous = slot.instance.state.clone();
            slot.in_flight = Some(action);
            if let Some(next) = action.optimistic_state() {
                slot.instance.state = next;
            }
            previous
        };
        self.touch();

        Ok(ActionGuard {
            store: Arc::clone(self),
            id: id.to_string(),
            action,
            previous,
            settled: false,
        })
    }

    fn settle(&self, id: &str, apply: impl FnOnce(&mut Slot)) {
        let now = Instant::now();
        {
            let mut inner = self.lock();
            if inner.closed {
                debug!(instance = %id, "store closed, discarding action result");
                return;
            }
            if let Some(slot) = inner.slots.get_mut(id) {
                slot.in_flight = None;
                apply(slot);
                if slot.instance.state == InstanceState::Terminated {
                    slot.terminated_at.get_or_insert(now);
                }
            }
        }
        self.touch();
    }
}

/// Exclusive claim on one instance while its action is in flight.
///
/// Dropping an unsettled guard only releases the claim; the optimistic state
/// stays until the next poll.
pub struct ActionGuard {
    store: Arc<InstanceStore>,
    id: String,
    action: Action,
    previous: InstanceState,
    settled: bool,
}

impl ActionGuard {
    pub fn action(&self) -> Action {
        self.action
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The backend accepted the action: keep the optimistic state until a poll confirms it.
    pub fn commit(mut self) {
        self.settled = true;
        self.store.settle(&self.id, |_| {});
    }

    /// The backend answered with the authoritative record.
    pub fn commit_with(mut self, instance: Instance) {
        self.settled = true;
        self.store.settle(&self.id, |slot| slot.instance = instance);
    }

    /// The action failed: restore the pre-action state.
    pub fn rollback(mut self) {
        self.settled = true;
        let previous = self.previous.clone();
        self.store.settle(&self.id, |slot| slot.instance.state = previous);
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        if !self.settled {
            debug!(instance = %self.id, action = %self.action, "action abandoned");
            self.store.settle(&self.id, |_| {});
        }
    }
}
