//! Type definitions for the grabber
//!
//! This module contains the session model, reservation targets and events,
//! and the wire types of the remote service.

pub mod portal;
pub mod reservation;
pub mod session;

pub use reservation::{
    Category, EventKind, ReservationEvent, ReservationOutcome, ReservationTarget,
};
pub use session::{CookieJar, Credentials, Session, SessionParts, SessionSummary};
