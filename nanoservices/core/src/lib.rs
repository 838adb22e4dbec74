//! sekolah_core: extract, transform and load stages for school records,
//! plus the scheduler that runs them once a day.
//!
//! A pipeline is three stages composed in order: a [`sources::Source`] reads
//! the raw collection, a [`transforms::Transform`] filters and enriches it into
//! an Arrow-backed frame, and a [`destinations::Destination`] replaces the
//! destination table with that frame.
//!
//! ```no_run
//! use sekolah_core::config::loader::load_config;
//! use sekolah_core::engine::SekolahFlow;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("demos/sekolah_etl.yaml")?;
//! SekolahFlow::from_config(&config)?.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod contract;
pub mod sources;
pub mod destinations;
pub mod transforms;
pub mod events;
pub mod store;
pub mod scheduler;
pub mod config;
pub mod builder;
pub mod pipeline;
pub mod engine;

pub mod logging;

pub mod metrics;
