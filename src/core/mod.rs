//! Core components shared by every feature module.
//!
//! This module contains the foundational building blocks of the crate, including:
//! - The provider [`ProviderClient`] and its builder, plus the retry combinator.
//! - The primary [`PulseError`] type.
//! - Shared data models like [`PriceSnapshot`] and [`HistoricalSeries`].
//! - The [`ChartService`] seam and request pacing.

/// The provider client (`ProviderClient`), builder, and retry configuration.
pub mod client;
/// The primary error type (`PulseError`) for the crate.
pub mod error;
/// Shared data models used across modules (instruments, snapshots, history params).
pub mod models;
pub(crate) mod net;
/// Fixed-interval gate used to pace provider requests.
pub mod pacing;
/// Service traits for abstracting chart fetching.
pub mod services;
pub(crate) mod wire;

// convenient re-exports so most code can just `use crate::core::ProviderClient`
pub use client::{Backoff, ProviderClient, ProviderClientBuilder, RetryConfig};
pub use error::PulseError;
pub use models::{
    HistoricalSeries, HistorySnapshot, Instrument, InstrumentSet, Interval, PriceSnapshot, Range,
    UNAVAILABLE_PRICE,
};
pub use pacing::FixedIntervalGate;
pub use services::{ChartRequest, ChartService};
pub use wire::Chart;
