//! Housekeeping task generation driven by booking stay duration.
//!
//! `compute_schedule` derives the task plan implied by a booking's length of
//! stay; `TaskGenerator` persists it idempotently, suppressing the checkout
//! cleaning on same-day turnovers.

mod generator;
mod schedule;
mod types;

pub use generator::TaskGenerator;
pub use schedule::{compute_schedule, PlannedTask, Schedule};
pub use types::{
  Booking, GenerationReport, HousekeepingTask, SkippedTask, TaskStatus, TaskType,
};
