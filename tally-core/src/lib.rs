//! # tally-core
//!
//! Client library for reporting user events and profile updates to an
//! analytics collector.
//!
//! This library provides:
//! - Validation of event names, identifiers, and property maps
//! - A canonical JSON event envelope
//! - Consumers that deliver envelopes immediately, in gzipped batches, or to a file
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! Every call on a [`Tracker`] runs synchronously through four stages:
//! - **Normalize:** merge super properties, extract `$time`, add library metadata
//! - **Validate:** reject bad identifiers, names, and values before anything is sent
//! - **Serialize:** render the envelope as one JSON object
//! - **Deliver:** hand the JSON to a [`Consumer`], which may buffer it
//!
//! ## Example
//!
//! ```rust,no_run
//! use tally_core::{Config, Properties, Tracker};
//!
//! let config = Config::load().expect("failed to load config");
//! let mut tracker = Tracker::from_config(&config).expect("failed to create tracker");
//!
//! let props = Properties::new().with("From", "Baidu");
//! tracker.track("user-1234", "ViewProduct", &props).expect("invalid event");
//! tracker.profile_set("user-1234", &Properties::new().with("City", "Beijing")).expect("invalid profile");
//!
//! tracker.close().expect("delivery failed");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use consumer::{BatchConsumer, Consumer, FileConsumer, ImmediateConsumer};
pub use error::{Error, Result, ValidationError, ValidationErrorKind};
pub use tracker::{Tracker, UnsetKeys};
pub use transport::{HttpTransport, Transport};
pub use types::*;

// Public modules
pub mod clock;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod serialize;
pub mod super_props;
pub mod tracker;
pub mod transport;
pub mod types;
pub mod validate;
