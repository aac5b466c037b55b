//! Idempotent persistence of the housekeeping schedule.

use color_eyre::Result;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::backend::{Backend, Filter, InsertOutcome, Row};
use crate::notify::{LogNotifier, Notifier};

use super::schedule::{compute_schedule, PlannedTask};
use super::types::{Booking, GenerationReport, HousekeepingTask, SkippedTask, TaskStatus};

const BOOKINGS_TABLE: &str = "bookings";
const TASKS_TABLE: &str = "housekeeping_tasks";

/// Uniqueness key for task rows. The backend enforces at most one row per
/// triple, so concurrent generation runs for the same booking cannot
/// double-insert.
const TASK_CONFLICT_COLUMNS: &[&str] = &["booking_id", "task_type", "due_date"];

const SAME_DAY_REASON: &str = "Same-day check-in detected";
const DUPLICATE_REASON: &str = "Task already scheduled";

/// Derives and persists the housekeeping tasks implied by a booking.
pub struct TaskGenerator<B: Backend> {
  backend: Arc<B>,
  notifier: Arc<dyn Notifier>,
}

impl<B: Backend> TaskGenerator<B> {
  pub fn new(backend: Arc<B>) -> Self {
    Self {
      backend,
      notifier: Arc::new(LogNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Generate the task schedule for a booking and insert any tasks not
  /// already present.
  ///
  /// Single-task insert failures are recorded as skipped and do not abort
  /// the run. An unexpected failure of the run itself (schedule computation,
  /// turnover lookup) aborts with an all-empty report and an error
  /// notification; no partial task list is returned in that case.
  pub async fn generate(&self, booking: &Booking) -> GenerationReport {
    match self.generate_inner(booking).await {
      Ok(report) => {
        self.notifier.success(&format!(
          "Housekeeping for {}: {} task(s) created, {} skipped",
          booking.guest_name,
          report.tasks_created.len(),
          report.tasks_skipped.len()
        ));
        report
      }
      Err(e) => {
        tracing::error!(booking_id = %booking.id, error = %e, "task generation failed");
        self.notifier.error(&format!(
          "Failed to generate housekeeping tasks for {}: {}",
          booking.guest_name, e
        ));
        GenerationReport::empty()
      }
    }
  }

  async fn generate_inner(&self, booking: &Booking) -> Result<GenerationReport> {
    let schedule = compute_schedule(booking.check_in_date, booking.check_out_date)?;

    let mut report = GenerationReport {
      manual_schedule_required: schedule.manual_schedule_required,
      ..GenerationReport::empty()
    };

    let mut planned = Vec::with_capacity(schedule.mid_stay.len() + 2);
    planned.push(schedule.pre_arrival);
    planned.extend(schedule.mid_stay);

    if self.has_same_day_turnover(booking).await? {
      tracing::info!(
        booking_id = %booking.id,
        property_id = %booking.property_id,
        date = %booking.check_out_date,
        "skipping checkout cleaning: same-day turnover"
      );
      report.tasks_skipped.push(SkippedTask {
        task_type: schedule.checkout.task_type,
        due_date: schedule.checkout.due_date,
        reason: SAME_DAY_REASON.to_string(),
      });
    } else {
      planned.push(schedule.checkout);
    }

    for plan in planned {
      let task = to_task(booking, &plan);
      match self
        .backend
        .insert_unique(TASKS_TABLE, task_row(&task), TASK_CONFLICT_COLUMNS)
        .await
      {
        Ok(InsertOutcome::Inserted) => report.tasks_created.push(task),
        Ok(InsertOutcome::Conflict) => report.tasks_skipped.push(SkippedTask {
          task_type: plan.task_type,
          due_date: plan.due_date,
          reason: DUPLICATE_REASON.to_string(),
        }),
        Err(e) => {
          tracing::warn!(
            booking_id = %booking.id,
            task_type = %plan.task_type,
            due_date = %plan.due_date,
            error = %e,
            "failed to insert housekeeping task"
          );
          report.tasks_skipped.push(SkippedTask {
            task_type: plan.task_type,
            due_date: plan.due_date,
            reason: e.to_string(),
          });
        }
      }
    }

    Ok(report)
  }

  /// A same-day turnover is another booking on the same property whose
  /// check-in falls on this booking's checkout date.
  async fn has_same_day_turnover(&self, booking: &Booking) -> Result<bool> {
    let filter = Filter::new()
      .eq("property_id", booking.property_id.as_str())
      .eq("check_in_date", booking.check_out_date.to_string());

    let rows = self.backend.select(BOOKINGS_TABLE, &filter).await?;
    Ok(
      rows
        .iter()
        .any(|row| row.get("id").and_then(Value::as_str) != Some(booking.id.as_str())),
    )
  }
}

fn to_task(booking: &Booking, plan: &PlannedTask) -> HousekeepingTask {
  HousekeepingTask {
    booking_id: booking.id.clone(),
    listing_id: booking.listing_id.clone(),
    task_type: plan.task_type,
    due_date: plan.due_date,
    status: TaskStatus::Pending,
    description: plan.description.clone(),
  }
}

fn task_row(task: &HousekeepingTask) -> Row {
  let mut row = Row::new();
  row.insert("booking_id".to_string(), json!(task.booking_id));
  row.insert("listing_id".to_string(), json!(task.listing_id));
  row.insert("task_type".to_string(), json!(task.task_type.as_str()));
  row.insert("due_date".to_string(), json!(task.due_date.to_string()));
  row.insert("status".to_string(), json!("pending"));
  row.insert("description".to_string(), json!(task.description));
  row
}
