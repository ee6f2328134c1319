//! Day views and weekly adherence arithmetic. No I/O.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use coachline_db::models::{MealMap, MealStatus, TrackingEntry};

/// Number of days covered by a weekly progress report.
pub const WEEK_DAYS: usize = 7;

/// One tracking day as returned to callers. A day nobody wrote to is the
/// empty default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackingDay {
    pub meals: MealMap,
    pub notes: String,
    pub supplementation: String,
}

impl From<TrackingEntry> for TrackingDay {
    fn from(entry: TrackingEntry) -> Self {
        Self {
            meals: entry.meals.0,
            notes: entry.notes,
            supplementation: entry.supplementation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayProgress {
    pub date: NaiveDate,
    /// Whole percentage in `0..=100`.
    pub completion_rate: u8,
    pub total_meals: usize,
    pub completed_meals: usize,
    pub notes: String,
}

/// Percentage of completed meals, rounded half up. Zero for a day with no
/// meals.
pub fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    // round(100 * c / t) == floor((200 * c + t) / (2 * t))
    ((200 * completed + total) / (2 * total)) as u8
}

/// First day of the week that ends on `end_date`, or `None` when that
/// falls outside the calendar chrono can represent.
pub fn week_start(end_date: NaiveDate) -> Option<NaiveDate> {
    end_date.checked_sub_days(Days::new(WEEK_DAYS as u64 - 1))
}

/// Progress for the seven days starting at `start`, oldest first. Days
/// without an entry report zero meals.
pub fn weekly_progress(start: NaiveDate, entries: Vec<TrackingEntry>) -> Vec<DayProgress> {
    let mut by_date: HashMap<NaiveDate, TrackingEntry> =
        entries.into_iter().map(|e| (e.date, e)).collect();

    start
        .iter_days()
        .take(WEEK_DAYS)
        .map(|date| match by_date.remove(&date) {
            Some(entry) => day_progress(date, &entry.meals.0, entry.notes),
            None => day_progress(date, &MealMap::new(), String::new()),
        })
        .collect()
}

fn day_progress(date: NaiveDate, meals: &MealMap, notes: String) -> DayProgress {
    let total_meals = meals.len();
    let completed_meals = meals
        .values()
        .filter(|m| m.status == MealStatus::Completed)
        .count();
    DayProgress {
        date,
        completion_rate: completion_rate(completed_meals, total_meals),
        total_meals,
        completed_meals,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    use coachline_db::models::MealEntry;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn entry(on: &str, statuses: &[MealStatus], notes: &str) -> TrackingEntry {
        let meals = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                (
                    format!("meal{i}"),
                    MealEntry {
                        status: *status,
                        completed_at: None,
                    },
                )
            })
            .collect();
        TrackingEntry {
            id: Uuid::new_v4(),
            assigned_plan_id: Uuid::new_v4(),
            date: date(on),
            meals: Json(meals),
            notes: notes.into(),
            supplementation: String::new(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rate_rounds_half_up() {
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(completion_rate(0, 4), 0);
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 8), 13); // 12.5
        assert_eq!(completion_rate(5, 5), 100);
    }

    #[test]
    fn week_is_seven_days_ending_on_end_date() {
        let start = week_start(date("2025-03-02")).unwrap();
        let week = weekly_progress(start, Vec::new());

        assert_eq!(week.len(), WEEK_DAYS);
        assert_eq!(week[0].date, date("2025-02-24"));
        assert_eq!(week[6].date, date("2025-03-02"));
        assert!(week.iter().all(|d| d.total_meals == 0 && d.completion_rate == 0));
    }

    #[test]
    fn entries_land_on_their_day() {
        use MealStatus::{Completed, Pending};

        let start = date("2025-01-01");
        let week = weekly_progress(
            start,
            vec![
                entry("2025-01-07", &[Completed, Pending, Pending], "tired"),
                entry("2025-01-02", &[Completed, Completed], ""),
            ],
        );

        assert_eq!(week[1].completed_meals, 2);
        assert_eq!(week[1].completion_rate, 100);
        assert_eq!(week[6].total_meals, 3);
        assert_eq!(week[6].completion_rate, 33);
        assert_eq!(week[6].notes, "tired");
        assert_eq!(week[3].total_meals, 0);
    }

    #[test]
    fn default_day_is_empty() {
        let day = TrackingDay::default();
        assert_eq!(
            serde_json::to_value(&day).unwrap(),
            serde_json::json!({ "meals": {}, "notes": "", "supplementation": "" })
        );
    }
}
