//! xkfw-grabber - course seat grabber for the XJTU course-selection portal
//!
//! Logs in through the university's open-platform SSO, resolves everything the
//! course-selection service needs to accept a pick, then keeps submitting the
//! pick for each configured course until the seat is taken.
//!
//! # Architecture
//!
//! - [`session`]: the login handshake ([`SessionNegotiator`]) and the shared,
//!   versioned [`SessionStore`] that re-authenticates at most once at a time
//! - [`reservation`]: one retry loop per course, run together as a [`Campaign`]
//! - [`config`]: TOML configuration with environment overrides
//!
//! # Usage
//!
//! ```bash
//! xkfw-grab init
//! XKFW_PASSWORD=... xkfw-grab --course COMP30072701:major
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xkfw_grabber::{
//!     Campaign, PortalClient, SessionNegotiator, SessionStore, Settings,
//!     types::{Category, Credentials, ReservationTarget},
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let client = PortalClient::new(&settings)?;
//! let negotiator = SessionNegotiator::new(client.clone(), settings.auth.clone());
//! let store = Arc::new(SessionStore::new(
//!     Arc::new(negotiator),
//!     Credentials::new("2201111111", "password"),
//!     settings.reservation.relogin_interval,
//! ));
//! store.refresh().await?;
//!
//! let campaign = Campaign::new(store, Arc::new(client), settings.reservation.clone());
//! let mut running = campaign.start(&[ReservationTarget::new("COMP30072701", Category::Major)])?;
//! while let Some(event) = running.events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod reservation;
pub mod session;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, Settings};
pub use error::{AuthStage, Error, Result};
pub use reservation::{Campaign, CampaignHandle, StopReason};
pub use session::{PortalClient, SessionNegotiator, SessionStore};
