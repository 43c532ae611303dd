//! Dispatcher: route each account change to immediate delivery or the queue.
//!
//! Per target domain, a change moves `Unstarted → Delivered | Queued | Failed`:
//!
//! - target configured `queue_only`, or blocked by a sentinel, class marker
//!   or pending entry of the same class → enqueue
//! - otherwise deliver; a transient delivery failure → enqueue
//! - a permanent delivery failure → `Failed`, nothing queued
//!
//! The blocking check holds the queue lock, so a missing queue directory
//! fails the call with `QueueUnavailable` before the client is ever asked.
//! When queueing fails, that failure is what the caller sees, never the
//! delivery failure that led to it.

use acctsync_core::{ChangeRecord, Domain, OperationClass, Password, Principal, SyncPolicy};
use acctsync_queue::{enqueue, sentinel, Enqueued, QueueDir};

use crate::delivery::{DeliveryClient, DeliveryError};
use crate::error::SyncError;

/// How one change reached one target domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Queued(Enqueued),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOutcome {
    pub domain: Domain,
    pub delivery: Delivery,
}

/// Successful result of one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Synchronisation is not configured for this principal and change.
    /// Nothing was touched.
    Disabled,
    Propagated(Vec<DomainOutcome>),
}

impl Outcome {
    pub fn queued(&self) -> impl Iterator<Item = &Enqueued> {
        let outcomes = match self {
            Outcome::Disabled => &[][..],
            Outcome::Propagated(outcomes) => outcomes.as_slice(),
        };
        outcomes.iter().filter_map(|o| match &o.delivery {
            Delivery::Queued(enqueued) => Some(enqueued),
            Delivery::Delivered => None,
        })
    }
}

pub struct Dispatcher<P, C> {
    queue: QueueDir,
    policy: P,
    client: C,
}

impl<P: SyncPolicy, C: DeliveryClient> Dispatcher<P, C> {
    pub fn new(queue: QueueDir, policy: P, client: C) -> Self {
        Self {
            queue,
            policy,
            client,
        }
    }

    /// Propagate a password change to every target configured for it.
    pub fn on_password_change(
        &self,
        principal: &Principal,
        password: Password,
    ) -> Result<Outcome, SyncError> {
        self.dispatch(principal, OperationClass::Password, |domain| {
            ChangeRecord::password(principal, domain, password.clone())
        })
    }

    /// Propagate an account enable (`true`) or disable (`false`).
    pub fn on_status_change(
        &self,
        principal: &Principal,
        enabled: bool,
    ) -> Result<Outcome, SyncError> {
        self.dispatch(principal, OperationClass::Status, |domain| {
            ChangeRecord::status(principal, domain, enabled)
        })
    }

    /// Every target is attempted even after one fails; the first failure is
    /// returned.
    fn dispatch(
        &self,
        principal: &Principal,
        class: OperationClass,
        record_for: impl Fn(Domain) -> ChangeRecord,
    ) -> Result<Outcome, SyncError> {
        let targets = self.policy.targets_for(principal, class);
        if targets.is_empty() {
            tracing::debug!("sync not configured for {principal}; ignoring change");
            return Ok(Outcome::Disabled);
        }

        let mut outcomes = Vec::with_capacity(targets.len());
        let mut first_err = None;
        for target in targets {
            let record = record_for(target.domain.clone());
            match self.propagate(&record, target.queue_only) {
                Ok(delivery) => outcomes.push(DomainOutcome {
                    domain: target.domain,
                    delivery,
                }),
                Err(e) => {
                    tracing::error!("{principal} -> {}: {e}", target.domain);
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(Outcome::Propagated(outcomes)),
        }
    }

    /// Run one record through the delivery state machine.
    pub fn propagate(&self, record: &ChangeRecord, queue_only: bool) -> Result<Delivery, SyncError> {
        let blocked = queue_only
            || sentinel::is_blocked_for(
                &self.queue,
                record.principal(),
                record.domain(),
                record.operation(),
            )?;
        if blocked {
            return self.enqueue(record);
        }

        match self.client.deliver(record) {
            Ok(()) => {
                tracing::info!(
                    "delivered {} change for {} to {}",
                    record.operation(),
                    record.principal(),
                    record.domain()
                );
                Ok(Delivery::Delivered)
            }
            Err(DeliveryError::Transient(reason)) => {
                tracing::warn!(
                    "{} change for {} to {} deferred: {reason}",
                    record.operation(),
                    record.principal(),
                    record.domain()
                );
                self.enqueue(record)
            }
            Err(DeliveryError::Permanent(message)) => Err(SyncError::Delivery {
                principal: record.principal().to_owned(),
                domain: record.domain().clone(),
                operation: record.operation(),
                message,
            }),
        }
    }

    fn enqueue(&self, record: &ChangeRecord) -> Result<Delivery, SyncError> {
        Ok(Delivery::Queued(enqueue(&self.queue, record)?))
    }
}
