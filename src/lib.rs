//! hookdash: a terminal dashboard for a webhook-ingestion backend.
//!
//! The backend's summary endpoint is polled on a timer and rendered as a
//! per-day line chart, a per-source doughnut, stat counters and a
//! recent-activity table. Filtered views fetch raw records and aggregate
//! them client-side.

pub mod activity;
pub mod aggregate;
pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod model;
pub mod palette;
pub mod render;
