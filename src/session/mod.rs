//! Session negotiation and sharing
//!
//! This module turns credentials into an authenticated [`Session`](crate::types::Session)
//! and keeps the current one available to every reservation loop. It covers
//! password encryption, the portal endpoints, bounded retries and the
//! versioned session store.

pub mod crypto;
pub mod negotiator;
pub mod network;
pub mod portal;
pub mod store;

pub use negotiator::{Negotiate, SessionNegotiator};
pub use network::{NetworkManager, RetryPolicy};
pub use portal::{PortalClient, ReservationApi};
pub use store::{SessionHandle, SessionStore};
