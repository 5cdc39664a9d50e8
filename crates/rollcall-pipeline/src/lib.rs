// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Membership event pipeline for Rollcall.
//!
//! Raw group notifications enter through [`PipelineService`], which
//! normalizes them, resolves display names, records them in the local
//! durability log, and delivers them to the primary store with a secondary
//! fallback. Events that cannot be delivered go to a bounded, journal-backed
//! buffer that a background loop drains.

pub mod buffer;
pub mod dedup;
pub mod delivery;
pub mod drain;
pub mod durability;
pub mod journal;
pub mod key;
pub mod names;
pub mod normalize;
pub mod resolver;
pub mod service;
pub mod status;

pub use buffer::{BufferStatus, BufferedEvent, EnqueueOutcome, EventBuffer, NackOutcome, Recovery};
pub use dedup::DedupCache;
pub use delivery::{DeliveryOutcome, DeliveryPipeline, DeliveryReport, Sink};
pub use drain::run_drain_loop;
pub use durability::{
    DurabilityLog, EmergencyFile, EmergencyRecord, format_event_line, read_emergency_records,
};
pub use journal::{Journal, read_entries};
pub use key::compute_key;
pub use names::{UNKNOWN_GROUP, format_user_id};
pub use normalize::{Rejection, normalize};
pub use resolver::NameResolver;
pub use service::{DrainReport, PipelinePorts, PipelineService};
pub use status::{PipelineStatus, read_status, run_status_writer, write_status};
