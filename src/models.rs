use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_id: String,
    pub session_start: NaiveDateTime,
    pub session_end: NaiveDateTime,
    pub app_version: String,
    pub group: String,
    pub device_type: String,
    pub os: String,
    pub language_preference: String,
    pub referral_source: String,
    pub subscription_type: String,
    pub is_premium_user: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserAggregate {
    pub user_id: String,
    pub total_clicks: f64,
    pub total_impressions: f64,
    pub total_completed: f64,
    pub total_started: f64,
    pub total_watch_time: f64,
    pub total_sessions: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserEngagement {
    pub user_id: String,
    pub returned_within_week: u8,
    pub ctr: f64,
    pub completion_rate: f64,
    pub avg_minutes_watched: f64,
}
