use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::metrics;
use crate::models::{SessionRecord, UserAggregate, UserEngagement};

pub fn build_engagement(
    aggregates: &[UserAggregate],
    return_flags: &BTreeMap<String, u8>,
) -> Vec<UserEngagement> {
    let clicks: Vec<f64> = aggregates.iter().map(|a| a.total_clicks).collect();
    let impressions: Vec<f64> = aggregates.iter().map(|a| a.total_impressions).collect();
    let completed: Vec<f64> = aggregates.iter().map(|a| a.total_completed).collect();
    let started: Vec<f64> = aggregates.iter().map(|a| a.total_started).collect();
    let watch_time: Vec<f64> = aggregates.iter().map(|a| a.total_watch_time).collect();
    let session_counts: Vec<f64> = aggregates.iter().map(|a| a.total_sessions).collect();

    let ctr = metrics::compute_user_ctr(&clicks, &impressions);
    let completion = metrics::compute_user_completion_rate(&completed, &started);
    let minutes = metrics::compute_avg_minutes_watched(&watch_time, &session_counts);

    let mut rows: Vec<UserEngagement> = aggregates
        .iter()
        .enumerate()
        .map(|(index, aggregate)| UserEngagement {
            user_id: aggregate.user_id.clone(),
            returned_within_week: return_flags.get(&aggregate.user_id).copied().unwrap_or(0),
            ctr: ctr[index],
            completion_rate: completion[index],
            avg_minutes_watched: minutes[index],
        })
        .collect();

    // users seen in the session log but absent from the aggregate export
    let covered: HashSet<&str> = aggregates.iter().map(|a| a.user_id.as_str()).collect();
    for (user_id, flag) in return_flags {
        if !covered.contains(user_id.as_str()) {
            rows.push(UserEngagement {
                user_id: user_id.clone(),
                returned_within_week: *flag,
                ctr: 0.0,
                completion_rate: 0.0,
                avg_minutes_watched: 0.0,
            });
        }
    }

    rows.sort_by(|a, b| {
        b.avg_minutes_watched
            .partial_cmp(&a.avg_minutes_watched)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    rows
}

pub fn build_report(
    sessions: &[SessionRecord],
    engagement: Option<&[UserEngagement]>,
    return_flags: &BTreeMap<String, u8>,
) -> String {
    let mut output = String::new();
    let users: HashSet<&str> = sessions.iter().map(|s| s.user_id.as_str()).collect();

    let _ = writeln!(output, "# Streaming A/B Session Engagement Report");
    let range = (
        sessions.iter().map(|s| s.session_start).min(),
        sessions.iter().map(|s| s.session_start).max(),
    );
    match range {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                output,
                "Generated from {} sessions across {} users ({} to {})",
                sessions.len(),
                users.len(),
                first,
                last
            );
        }
        _ => {
            let _ = writeln!(output, "Generated from an empty session export.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Seven-Day Return");

    if return_flags.is_empty() {
        let _ = writeln!(output, "No users in this export.");
    } else {
        let returned = return_flags.values().filter(|flag| **flag == 1).count();
        let _ = writeln!(
            output,
            "{} of {} users returned within 7 days of their first session.",
            returned,
            return_flags.len()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Engaged Users");

    match engagement {
        Some(rows) if !rows.is_empty() => {
            for row in rows.iter().take(10) {
                let _ = writeln!(
                    output,
                    "- {}: {:.1} min/session, CTR {:.3}, completion {:.2}, {}",
                    row.user_id,
                    row.avg_minutes_watched,
                    row.ctr,
                    row.completion_rate,
                    if row.returned_within_week == 1 {
                        "returned within 7 days"
                    } else {
                        "did not return"
                    }
                );
            }
        }
        Some(_) => {
            let _ = writeln!(output, "No per-user aggregates in this export.");
        }
        None => {
            let _ = writeln!(output, "No per-user aggregates supplied.");
        }
    }

    let mut recent: Vec<&SessionRecord> = sessions.iter().collect();
    recent.sort_by(|a, b| b.session_start.cmp(&a.session_start));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Sessions");

    if recent.is_empty() {
        let _ = writeln!(output, "No sessions recorded.");
    } else {
        for session in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} on {} {} (group {}) starting {}",
                session.user_id,
                session.device_type,
                session.os,
                session.group,
                session.session_start
            );
        }
    }

    output
}
