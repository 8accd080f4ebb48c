use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Most recent commands kept per user.
pub const RECENT_COMMANDS_LIMIT: usize = 8;

/// An assistant action whose autonomy the user can tune.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotAction {
    ReplyMessages,
    ScheduleAppointments,
    AnswerReviews,
    SendCampaigns,
    FollowUpLeads,
}

impl AutopilotAction {
    pub const ALL: [AutopilotAction; 5] = [
        Self::ReplyMessages,
        Self::ScheduleAppointments,
        Self::AnswerReviews,
        Self::SendCampaigns,
        Self::FollowUpLeads,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplyMessages => "reply_messages",
            Self::ScheduleAppointments => "schedule_appointments",
            Self::AnswerReviews => "answer_reviews",
            Self::SendCampaigns => "send_campaigns",
            Self::FollowUpLeads => "follow_up_leads",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

/// How much the assistant may do on its own for an action.
///
/// - `Off`: never acts
/// - `Suggest`: drafts for the user to approve
/// - `Auto`: acts without asking
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotLevel {
    Off,
    #[default]
    Suggest,
    Auto,
}

impl AutopilotLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Suggest => "suggest",
            Self::Auto => "auto",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Self::Off),
            "suggest" => Some(Self::Suggest),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Autopilot level for every known action, defaults filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutopilotSettings {
    pub levels: BTreeMap<AutopilotAction, AutopilotLevel>,
}

impl Default for AutopilotSettings {
    fn default() -> Self {
        Self {
            levels: AutopilotAction::ALL
                .into_iter()
                .map(|a| (a, AutopilotLevel::default()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAutopilotLevelInput {
    pub action: AutopilotAction,
    pub level: AutopilotLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentCommand {
    pub command: String,
    pub used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushRecentCommandInput {
    pub command: String,
}
