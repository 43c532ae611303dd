//! The immediate-delivery seam.
//!
//! The remote directory client (LDAP modify, password-set RPC) lives outside
//! this workspace. It only has to say whether a failure is worth retrying:
//! transient failures are queued for the batch consumer, permanent ones are
//! reported to the host.

use thiserror::Error;

use acctsync_core::ChangeRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The target may accept the change later (unreachable, busy, timed out).
    #[error("transient delivery failure: {0}")]
    Transient(String),

    /// The target will never accept this change as sent.
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

pub trait DeliveryClient {
    fn deliver(&self, record: &ChangeRecord) -> Result<(), DeliveryError>;
}

impl<C: DeliveryClient + ?Sized> DeliveryClient for &C {
    fn deliver(&self, record: &ChangeRecord) -> Result<(), DeliveryError> {
        (**self).deliver(record)
    }
}

impl<C: DeliveryClient + ?Sized> DeliveryClient for Box<C> {
    fn deliver(&self, record: &ChangeRecord) -> Result<(), DeliveryError> {
        (**self).deliver(record)
    }
}
