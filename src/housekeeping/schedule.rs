//! Pure stay-duration schedule computation.

use chrono::{Days, NaiveDate};
use color_eyre::{eyre::eyre, Result};

use super::types::TaskType;

/// One task the schedule calls for, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
  pub task_type: TaskType,
  pub due_date: NaiveDate,
  pub description: String,
}

impl PlannedTask {
  fn new(task_type: TaskType, due_date: NaiveDate, description: &str) -> Self {
    Self {
      task_type,
      due_date,
      description: description.to_string(),
    }
  }
}

/// The task plan implied by a booking's length of stay.
///
/// The checkout task is listed separately because its inclusion depends on a
/// same-day turnover lookup the caller performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
  /// Whole nights between check-in and check-out.
  pub stay_nights: i64,
  pub pre_arrival: PlannedTask,
  pub mid_stay: Vec<PlannedTask>,
  pub checkout: PlannedTask,
  /// True for stays over seven nights: only a placeholder is planned and a
  /// human must finish the schedule.
  pub manual_schedule_required: bool,
}

fn plus_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
  date
    .checked_add_days(Days::new(days as u64))
    .ok_or_else(|| eyre!("Date out of range: {} + {} days", date, days))
}

/// Compute the housekeeping schedule for a stay.
///
/// - Every stay gets a pre-arrival Standard Cleaning the day before check-in.
/// - Stays of up to 3 nights get no mid-stay service.
/// - 4-5 nights: one Full Cleaning and one Linen & Towel Change at the
///   midpoint.
/// - 6-7 nights: two of each, at the one-third and two-thirds marks.
/// - Over 7 nights: a single Custom Cleaning Schedule placeholder three days
///   in, flagged for manual scheduling.
pub fn compute_schedule(check_in: NaiveDate, check_out: NaiveDate) -> Result<Schedule> {
  let stay_nights = (check_out - check_in).num_days();
  if stay_nights <= 0 {
    return Err(eyre!(
      "Check-out {} must be after check-in {}",
      check_out,
      check_in
    ));
  }

  let pre_arrival = PlannedTask::new(
    TaskType::StandardCleaning,
    check_in
      .checked_sub_days(Days::new(1))
      .ok_or_else(|| eyre!("Date out of range: {} - 1 day", check_in))?,
    "Pre-arrival cleaning before guest check-in",
  );

  let mut mid_stay = Vec::new();
  let mut manual_schedule_required = false;

  match stay_nights {
    1..=3 => {}
    4..=5 => {
      let midpoint = plus_days(check_in, stay_nights / 2)?;
      mid_stay.push(PlannedTask::new(
        TaskType::FullCleaning,
        midpoint,
        "Mid-stay full cleaning",
      ));
      mid_stay.push(PlannedTask::new(
        TaskType::LinenTowelChange,
        midpoint,
        "Mid-stay linen and towel change",
      ));
    }
    6..=7 => {
      for mark in [stay_nights / 3, 2 * stay_nights / 3] {
        let date = plus_days(check_in, mark)?;
        mid_stay.push(PlannedTask::new(
          TaskType::FullCleaning,
          date,
          "Mid-stay full cleaning",
        ));
        mid_stay.push(PlannedTask::new(
          TaskType::LinenTowelChange,
          date,
          "Mid-stay linen and towel change",
        ));
      }
    }
    _ => {
      mid_stay.push(PlannedTask::new(
        TaskType::CustomCleaningSchedule,
        plus_days(check_in, 3)?,
        "Extended stay: custom cleaning schedule to be completed manually",
      ));
      manual_schedule_required = true;
    }
  }

  let checkout = PlannedTask::new(
    TaskType::StandardCleaning,
    check_out,
    "Post-checkout cleaning",
  );

  Ok(Schedule {
    stay_nights,
    pre_arrival,
    mid_stay,
    checkout,
    manual_schedule_required,
  })
}
