//! Alarm detection and lifecycle tracking.
//!
//! [`finder::AlarmFinder`] runs the incremental windowed scan: it advances
//! the durable checkpoint, aggregates per-channel extremes from the
//! measurement feed, and joins them against the enabled-channel thresholds.
//! [`manager::AlarmManager`] owns the durable [`registry::AlarmRegistry`]
//! and drives the per-channel start/continue/end state machine from a
//! single-worker, fixed-interval poll loop.
//!
//! A channel is either Normal (absent from the registry) or Alarmed
//! (present); there are no other states. All collaborator access goes
//! through the traits in `curamon-storage` and `curamon-notify`, injected
//! at construction.

pub mod checkpoint;
pub mod finder;
pub mod manager;
pub mod registry;
