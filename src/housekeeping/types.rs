//! Booking and housekeeping task records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A confirmed booking, as stored in the bookings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
  pub id: String,
  pub property_id: String,
  pub listing_id: Option<String>,
  pub check_in_date: NaiveDate,
  pub check_out_date: NaiveDate,
  pub guest_name: String,
  /// Free-form fields carried by the booking row (channel metadata,
  /// sync ids, notes) that this layer does not interpret.
  #[serde(flatten)]
  pub extra: serde_json::Map<String, Value>,
}

/// Kind of housekeeping work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
  #[serde(rename = "Standard Cleaning")]
  StandardCleaning,
  #[serde(rename = "Full Cleaning")]
  FullCleaning,
  #[serde(rename = "Linen & Towel Change")]
  LinenTowelChange,
  #[serde(rename = "Custom Cleaning Schedule")]
  CustomCleaningSchedule,
}

impl TaskType {
  pub fn as_str(&self) -> &'static str {
    match self {
      TaskType::StandardCleaning => "Standard Cleaning",
      TaskType::FullCleaning => "Full Cleaning",
      TaskType::LinenTowelChange => "Linen & Towel Change",
      TaskType::CustomCleaningSchedule => "Custom Cleaning Schedule",
    }
  }
}

impl std::fmt::Display for TaskType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
  Cancelled,
}

/// A housekeeping task row. At most one row exists per
/// `(booking_id, task_type, due_date)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousekeepingTask {
  pub booking_id: String,
  pub listing_id: Option<String>,
  pub task_type: TaskType,
  /// Calendar date, no time component.
  pub due_date: NaiveDate,
  pub status: TaskStatus,
  pub description: String,
}

/// A task that was planned but not inserted, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedTask {
  pub task_type: TaskType,
  pub due_date: NaiveDate,
  pub reason: String,
}

/// Outcome of one generation run for one booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
  pub tasks_created: Vec<HousekeepingTask>,
  pub tasks_skipped: Vec<SkippedTask>,
  /// True for stays over seven nights, where only a placeholder task is
  /// generated and a human must finish the schedule.
  pub manual_schedule_required: bool,
}

impl GenerationReport {
  pub fn empty() -> Self {
    Self::default()
  }
}
