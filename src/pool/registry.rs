//! Keyed store of live producers.
//!
//! The registry maps `source topic -> partition -> slot`. A slot is claimed in
//! the map before its producer exists, and creation happens under the slot's
//! own async lock. Callers racing on one key therefore wait for a single
//! factory call, while other keys never contend beyond a short map-shard lock.
//!
//! Slots move `Vacant -> Ready -> Retired` or `Vacant -> Failed` and never
//! back. A slot is always unlinked from the map before it is marked `Retired`,
//! so any caller that observes a retired slot can simply claim a fresh one.
//! A `Failed` slot is unlinked before its creation lock is released; callers
//! that were waiting on it share the failure instead of calling the factory
//! again.

use super::handle::{HandleFactory, ProducerOptions, PublishHandle};
use super::naming::make_producer_name;
use super::topic::SinkTopic;
use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

/// Snapshot of live producers, keyed by source topic then partition.
pub type ProducerView<H> = BTreeMap<String, BTreeMap<u32, Arc<H>>>;

enum SlotState<H> {
    Vacant,
    Ready(Arc<H>),
    /// Creation failed; holds the factory's error message.
    Failed(Arc<str>),
    Retired,
}

impl<H> Clone for SlotState<H> {
    fn clone(&self) -> Self {
        match self {
            SlotState::Vacant => SlotState::Vacant,
            SlotState::Ready(handle) => SlotState::Ready(Arc::clone(handle)),
            SlotState::Failed(message) => SlotState::Failed(Arc::clone(message)),
            SlotState::Retired => SlotState::Retired,
        }
    }
}

struct Slot<H> {
    name: String,
    /// Held across the factory call and while retiring.
    create_lock: tokio::sync::Mutex<()>,
    state: Mutex<SlotState<H>>,
}

impl<H> Slot<H> {
    fn new(name: String) -> Self {
        Self {
            name,
            create_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SlotState::Vacant),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SlotState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SlotState<H> {
        self.lock_state().clone()
    }

    fn ready(&self) -> Option<Arc<H>> {
        match &*self.lock_state() {
            SlotState::Ready(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    fn replace(&self, next: SlotState<H>) -> SlotState<H> {
        std::mem::replace(&mut *self.lock_state(), next)
    }
}

/// Unlinks a slot whose creation never finished.
///
/// Lives for the span of a factory call. If the calling future is dropped
/// mid-creation the slot is retired and unlinked, so the key does not stay
/// pinned to a slot nobody will fill. A failed slot is unlinked the same way.
struct CreationGuard<'a, F: HandleFactory> {
    registry: &'a ProducerRegistry<F>,
    source_topic: &'a str,
    partition: u32,
    slot: &'a Arc<Slot<F::Handle>>,
    armed: bool,
}

impl<F: HandleFactory> CreationGuard<'_, F> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<F: HandleFactory> Drop for CreationGuard<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.slot.lock_state();
            if matches!(*state, SlotState::Vacant) {
                debug!(producer = %self.slot.name, "Producer creation abandoned");
                *state = SlotState::Retired;
            }
        }
        self.registry.unlink(self.source_topic, self.partition, self.slot);
    }
}

/// Counts one teardown that `close_all` must wait for.
struct PendingTeardown<'a> {
    retiring: &'a AtomicUsize,
    retired: &'a Notify,
}

impl Drop for PendingTeardown<'_> {
    fn drop(&mut self) {
        if self.retiring.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.retired.notify_waiters();
        }
    }
}

/// Registry of producers publishing to one sink topic.
pub struct ProducerRegistry<F: HandleFactory> {
    sink_topic: SinkTopic,
    factory: Arc<F>,
    options: ProducerOptions,
    slots: DashMap<String, HashMap<u32, Arc<Slot<F::Handle>>>>,
    closed: AtomicBool,
    /// Teardowns started by `close` that have not finished yet.
    retiring: AtomicUsize,
    retired: Notify,
}

impl<F: HandleFactory> ProducerRegistry<F> {
    pub fn new(sink_topic: SinkTopic, factory: Arc<F>, options: ProducerOptions) -> Self {
        Self {
            sink_topic,
            factory,
            options,
            slots: DashMap::new(),
            closed: AtomicBool::new(false),
            retiring: AtomicUsize::new(0),
            retired: Notify::new(),
        }
    }

    #[must_use]
    pub fn sink_topic(&self) -> &SinkTopic {
        &self.sink_topic
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Return the producer for a source partition, creating it on first use.
    ///
    /// Concurrent calls for the same key share a single factory call.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolClosed`] once [`close_all`](Self::close_all) has started.
    /// - [`Error::CreationFailure`] if the factory fails. Callers that were
    ///   waiting on the same attempt get the failure too. Nothing is cached,
    ///   so the next call tries again.
    #[instrument(level = "debug", skip(self), fields(sink = %self.sink_topic))]
    pub async fn get_or_create(&self, source_topic: &str, partition: u32) -> Result<Arc<F::Handle>> {
        loop {
            let slot = self.claim_slot(source_topic, partition)?;

            if let Some(handle) = slot.ready() {
                debug!(producer = %slot.name, "Reusing producer");
                return Ok(handle);
            }

            let _creating = slot.create_lock.lock().await;
            match slot.state() {
                SlotState::Ready(handle) => {
                    debug!(producer = %slot.name, "Producer created by concurrent caller");
                    return Ok(handle);
                }
                SlotState::Failed(message) => {
                    debug!(producer = %slot.name, "Producer creation failed for concurrent caller");
                    return Err(Error::CreationFailure {
                        producer: slot.name.clone(),
                        source: Box::new(Error::Shared(message.to_string())),
                    });
                }
                // Closed underneath us; it is already unlinked.
                SlotState::Retired => continue,
                SlotState::Vacant => {}
            }

            // Dropped before `_creating`, so the slot is unlinked while the
            // creation lock is still held.
            let mut guard = CreationGuard {
                registry: self,
                source_topic,
                partition,
                slot: &slot,
                armed: true,
            };

            let options = self.options.with_producer_name(slot.name.as_str());
            match self.factory.create(self.sink_topic.as_str(), &options).await {
                Ok(handle) => {
                    let handle = Arc::new(handle);
                    slot.replace(SlotState::Ready(Arc::clone(&handle)));
                    guard.disarm();
                    info!(producer = %slot.name, "Created producer");
                    return Ok(handle);
                }
                Err(e) => {
                    slot.replace(SlotState::Failed(e.to_string().into()));
                    error!(producer = %slot.name, error = %e, "Failed to create producer");
                    return Err(Error::CreationFailure {
                        producer: slot.name.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }
    }

    /// Remove and tear down the producer for a source partition.
    ///
    /// Unknown keys are ignored. The key is gone from the registry before the
    /// handle's teardown starts, and stays gone even if teardown fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Teardown`] if the handle fails to close.
    #[instrument(level = "debug", skip(self), fields(sink = %self.sink_topic))]
    pub async fn close(&self, source_topic: &str, partition: u32) -> Result<()> {
        let (slot, _pending) = {
            let Some(mut partitions) = self.slots.get_mut(source_topic) else {
                debug!("No producers for source topic");
                return Ok(());
            };
            let Some(slot) = partitions.remove(&partition) else {
                debug!("No producer for partition");
                return Ok(());
            };
            // Counted under the shard lock so a later drain in `close_all`
            // is guaranteed to see it.
            self.retiring.fetch_add(1, Ordering::SeqCst);
            let pending = PendingTeardown {
                retiring: &self.retiring,
                retired: &self.retired,
            };
            (slot, pending)
        };
        self.slots.remove_if(source_topic, |_, partitions| partitions.is_empty());

        Self::retire(slot).await
    }

    /// Close every producer and stop accepting new ones.
    ///
    /// Teardowns run concurrently and are all awaited, including any started
    /// earlier by [`close`](Self::close) that are still running. Calling this
    /// again after the first call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CloseAll`] carrying every teardown failure. All
    /// producers are removed regardless.
    #[instrument(skip(self), fields(sink = %self.sink_topic))]
    pub async fn close_all(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Producer pool already closed");
            return Ok(());
        }

        // Every shard is locked after the flag is set, so a claim either
        // lands before the drain or sees the pool closed.
        let mut slots = Vec::new();
        self.slots.retain(|_, partitions| {
            slots.extend(partitions.drain().map(|(_, slot)| slot));
            false
        });

        info!(producers = slots.len(), "Closing producer pool");

        let failures: Vec<Error> = join_all(slots.into_iter().map(Self::retire))
            .await
            .into_iter()
            .filter_map(|result| result.err())
            .collect();

        self.wait_for_teardowns().await;

        if failures.is_empty() {
            info!("Producer pool closed");
            Ok(())
        } else {
            warn!(failed = failures.len(), "Producer pool closed with teardown failures");
            Err(Error::CloseAll { failures })
        }
    }

    /// Live producers, keyed by source topic then partition.
    ///
    /// Producers still being created are not included.
    #[must_use]
    pub fn snapshot(&self) -> ProducerView<F::Handle> {
        let mut view = BTreeMap::new();
        for entry in self.slots.iter() {
            let partitions: BTreeMap<u32, Arc<F::Handle>> = entry
                .value()
                .iter()
                .filter_map(|(partition, slot)| slot.ready().map(|handle| (*partition, handle)))
                .collect();
            if !partitions.is_empty() {
                view.insert(entry.key().clone(), partitions);
            }
        }
        view
    }

    /// Number of live producers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .map(|entry| entry.value().values().filter(|slot| slot.ready().is_some()).count())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find or link the slot for a key.
    ///
    /// The closed flag is read under the shard lock so that it is ordered
    /// against the drain in `close_all`.
    fn claim_slot(&self, source_topic: &str, partition: u32) -> Result<Arc<Slot<F::Handle>>> {
        if let Some(partitions) = self.slots.get(source_topic) {
            if self.is_closed() {
                return Err(self.closed_error());
            }
            if let Some(slot) = partitions.get(&partition) {
                return Ok(Arc::clone(slot));
            }
        }

        let entry = self.slots.entry(source_topic.to_string());
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let new_slot = || Arc::new(Slot::new(make_producer_name(source_topic, partition)));
        match entry {
            Entry::Occupied(mut occupied) => Ok(Arc::clone(
                occupied.get_mut().entry(partition).or_insert_with(new_slot),
            )),
            Entry::Vacant(vacant) => {
                debug!(source_topic, partition, "Tracking new source topic");
                let slot = new_slot();
                vacant.insert(HashMap::from([(partition, Arc::clone(&slot))]));
                Ok(slot)
            }
        }
    }

    /// Drop a slot from the map if it is still the one linked for the key.
    fn unlink(&self, source_topic: &str, partition: u32, slot: &Arc<Slot<F::Handle>>) {
        if let Some(mut partitions) = self.slots.get_mut(source_topic) {
            if partitions
                .get(&partition)
                .is_some_and(|linked| Arc::ptr_eq(linked, slot))
            {
                partitions.remove(&partition);
            }
        }
        self.slots.remove_if(source_topic, |_, partitions| partitions.is_empty());
    }

    /// Retire an unlinked slot and tear down its producer, if any.
    async fn retire(slot: Arc<Slot<F::Handle>>) -> Result<()> {
        let handle = {
            // Waits out an in-flight creation so its handle is not leaked.
            let _creating = slot.create_lock.lock().await;
            match slot.replace(SlotState::Retired) {
                SlotState::Ready(handle) => handle,
                SlotState::Vacant | SlotState::Failed(_) | SlotState::Retired => return Ok(()),
            }
        };

        match handle.close().await {
            Ok(()) => {
                info!(producer = %slot.name, "Closed producer");
                Ok(())
            }
            Err(e) => {
                warn!(producer = %slot.name, error = %e, "Producer failed to close");
                Err(Error::Teardown {
                    producer: slot.name.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Wait until no teardown started by `close` is still running.
    async fn wait_for_teardowns(&self) {
        loop {
            // Registered before the check so a wakeup in between is not lost.
            let retired = self.retired.notified();
            let pending = self.retiring.load(Ordering::SeqCst);
            if pending == 0 {
                return;
            }
            debug!(pending, "Waiting for in-flight producer teardowns");
            retired.await;
        }
    }

    fn closed_error(&self) -> Error {
        Error::PoolClosed {
            sink_topic: self.sink_topic.to_string(),
        }
    }
}
