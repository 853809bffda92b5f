//! Seat reservation loops
//!
//! One loop per course keeps submitting the privileged action until the seat
//! is taken or the user stops it. A [`Campaign`] runs all configured courses
//! over one shared session store and publishes the online-user count.

pub mod campaign;
pub mod classify;
pub mod monitor;
pub mod runner;

pub use campaign::{Campaign, CampaignHandle};
pub use classify::{OutcomeMarkers, classify_response};
pub use monitor::spawn_online_monitor;
pub use runner::{LoopState, ReservationHandle, ReservationLoop, StopReason, spawn};
