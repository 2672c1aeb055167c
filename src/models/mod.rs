use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single viewer's choice in a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub user: String,
    pub choice: String,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(user: impl Into<String>, choice: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            choice: choice.into(),
            cast_at: Utc::now(),
        }
    }
}

/// Subscription level as reported by Helix ("1000", "2000", "3000").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tier {
    None,
    Tier1,
    Tier2,
    Tier3,
    Other(String),
}

impl Tier {
    pub fn from_api(raw: &str) -> Self {
        match raw {
            "1000" => Tier::Tier1,
            "2000" => Tier::Tier2,
            "3000" => Tier::Tier3,
            "" | "0000" => Tier::None,
            other => Tier::Other(other.to_string()),
        }
    }

    pub fn is_subscriber(&self) -> bool {
        !matches!(self, Tier::None)
    }

    /// Label used in the per-vote report file.
    pub fn short_label(&self) -> &str {
        match self {
            Tier::None => "None",
            Tier::Tier1 => "T1",
            Tier::Tier2 => "T2",
            Tier::Tier3 => "T3",
            Tier::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::None => write!(f, "-"),
            Tier::Tier1 => write!(f, "Tier 1"),
            Tier::Tier2 => write!(f, "Tier 2"),
            Tier::Tier3 => write!(f, "Tier 3"),
            Tier::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// One row of the Helix `GET /subscriptions` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub user_id: String,
    pub user_login: String,
    #[serde(default)]
    pub user_name: String,
    pub tier: String,
    #[serde(default)]
    pub is_gift: bool,
    #[serde(default)]
    pub plan_name: String,
}

#[cfg(test)]
impl SubscriptionRecord {
    pub fn stub(login: &str, tier: &str) -> Self {
        Self {
            user_id: format!("id-{}", login),
            user_login: login.to_string(),
            user_name: login.to_string(),
            tier: tier.to_string(),
            is_gift: false,
            plan_name: String::new(),
        }
    }
}

/// Viewer login to subscription lookup, fetched once at connect time.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionTable {
    by_login: HashMap<String, SubscriptionRecord>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: SubscriptionRecord) {
        self.by_login.insert(record.user_login.to_lowercase(), record);
    }

    pub fn tier_of(&self, user: &str) -> Tier {
        self.by_login
            .get(&user.to_lowercase())
            .map(|record| Tier::from_api(&record.tier))
            .unwrap_or(Tier::None)
    }

    pub fn len(&self) -> usize {
        self.by_login.len()
    }
}

impl FromIterator<SubscriptionRecord> for SubscriptionTable {
    fn from_iter<I: IntoIterator<Item = SubscriptionRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// A chat line from a viewer, already stripped of IRC framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub display_name: String,
    pub channel: String,
    pub text: String,
}
