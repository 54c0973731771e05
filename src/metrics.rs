use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;

use crate::models::SessionRecord;

pub const RETURN_WINDOW_DAYS: i64 = 7;

pub fn compute_user_ctr(total_clicks: &[f64], total_impressions: &[f64]) -> Vec<f64> {
    guarded_ratio(total_clicks, total_impressions)
}

pub fn compute_user_completion_rate(total_completed: &[f64], total_started: &[f64]) -> Vec<f64> {
    guarded_ratio(total_completed, total_started)
}

pub fn compute_avg_minutes_watched(total_watch_time: &[f64], total_sessions: &[f64]) -> Vec<f64> {
    guarded_ratio(total_watch_time, total_sessions)
}

fn guarded_ratio(numerators: &[f64], denominators: &[f64]) -> Vec<f64> {
    numerators
        .iter()
        .zip(denominators)
        .map(|(numerator, denominator)| {
            if *denominator > 0.0 {
                numerator / denominator
            } else {
                0.0
            }
        })
        .collect()
}

pub fn compute_seven_day_return_flags(sessions: &[SessionRecord]) -> BTreeMap<String, u8> {
    let mut starts_by_user: HashMap<&str, Vec<NaiveDateTime>> = HashMap::new();
    for session in sessions {
        starts_by_user
            .entry(session.user_id.as_str())
            .or_default()
            .push(session.session_start);
    }

    let mut flags = BTreeMap::new();
    for (user_id, starts) in starts_by_user {
        let first = match starts.iter().min() {
            Some(first) => *first,
            None => continue,
        };
        // whole elapsed days since the first session, not calendar-day crossings
        let returned = starts.iter().any(|start| {
            let days_since_first = (*start - first).num_days();
            days_since_first > 0 && days_since_first <= RETURN_WINDOW_DAYS
        });
        flags.insert(user_id.to_string(), u8::from(returned));
    }

    flags
}
