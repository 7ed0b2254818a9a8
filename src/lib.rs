//! # statbits - achievement state over a correlated stat channel
//!
//! `statbits` reads a peer's binary stat schema, resolves which achievement
//! bits are set, and plans the stat writes needed to lock or unlock a chosen
//! set of achievements. Requests to the peer are correlated with their
//! asynchronous replies by id, with a timeout per request.
//!
//! ## Features
//!
//! - **Schema codec**: bounded decoder (and encoder) for the nested key/value tree format.
//! - **Achievement extraction**: bit containers, progress dependencies and permission flags.
//! - **Localized names**: preferred language with English fallback.
//! - **Mutation planning**: one coalesced write per stat, per-item diagnostics.
//! - **Exchange coordination**: per-request correlation, claim-once timeouts, late reply discard.
//! - **Simulated peer** (`sim` feature): in-process peer for tests and the CLI.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use statbits::config::Config;
//! use statbits::exchange::{ChannelTransport, ExchangeCoordinator, PeerId};
//! use statbits::service::PeerSession;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("statbits.toml").await?;
//!     let (transport, _outbound) = ChannelTransport::channel();
//!     let coordinator = ExchangeCoordinator::from_config(
//!         PeerId::from("bot-1"),
//!         Arc::new(transport),
//!         &config.exchange,
//!     );
//!     let session = PeerSession::new(coordinator, config.locale.language.clone());
//!     // Replies from the transport go to `session.deliver(..)`.
//!     let report = session.get_report(440).await?;
//!     println!("{} achievements", report.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`schema`] - tree codec, achievement extraction, display names
//! - [`model`] - achievement and stat types, bit resolution
//! - [`planner`] - mutation planning and index lists
//! - [`exchange`] - request/reply correlation and the transport seam
//! - [`service`] - per-peer report and mutation operations
//! - [`registry`] - peer → session map
//! - [`report`] - text rendering
//! - [`config`] - TOML configuration

pub mod config;
pub mod error;
pub mod exchange;
pub mod logutil;
pub mod metrics;
pub mod model;
pub mod planner;
pub mod registry;
pub mod report;
pub mod schema;
pub mod service;
#[cfg(feature = "sim")]
pub mod sim;
