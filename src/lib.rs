//! End-to-end test harness for the farmOS WFS module
//!
//! Authenticates against farmOS with an OAuth2 password grant, seeds and
//! inspects assets over JSON:API, and drives the WFS endpoint the way a
//! desktop GIS client would: discovery, GetFeature into an in-memory layer,
//! and edits committed as WFS Transactions.

pub mod auth;
pub mod auth_config;
pub mod check;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod geometry;
pub mod harness;
pub mod jsonapi;
pub mod layer;
pub mod report;
pub mod runner;
pub mod suites;
pub mod wfs;
pub mod xml;

pub use cleanup::SENTINEL_MARKER;
pub use error::{HarnessError, HarnessResult};
pub use harness::Harness;
