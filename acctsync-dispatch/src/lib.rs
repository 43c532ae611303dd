//! # acctsync-dispatch
//!
//! Per-event decision point: deliver an account change to each configured
//! secondary system now, or persist it in the queue for later replay.
//!
//! Build a [`Dispatcher`] from a [`QueueDir`](acctsync_queue::QueueDir), a
//! [`SyncPolicy`](acctsync_core::SyncPolicy) and a [`DeliveryClient`], then
//! call [`Dispatcher::on_password_change`] or
//! [`Dispatcher::on_status_change`] once per host event.

pub mod delivery;
pub mod dispatcher;
pub mod error;

pub use delivery::{DeliveryClient, DeliveryError};
pub use dispatcher::{Delivery, Dispatcher, DomainOutcome, Outcome};
pub use error::SyncError;
