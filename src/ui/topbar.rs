//! Top bar display state
//!
//! Derived values for the header: user initials, status colours, the
//! rate-limit counter and the environment badge. Rendering is left to the
//! frontend; this module only computes what it shows and forwards the two
//! callbacks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Colour family of an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Caution,
    Critical,
    Neutral,
}

impl Tone {
    /// Text colour class
    pub fn text_class(self) -> &'static str {
        match self {
            Tone::Positive => "text-green-500",
            Tone::Caution => "text-amber-500",
            Tone::Critical => "text-red-500",
            Tone::Neutral => "text-gray-400",
        }
    }

    /// Background colour class
    pub fn bg_class(self) -> &'static str {
        match self {
            Tone::Positive => "bg-green-500",
            Tone::Caution => "bg-amber-500",
            Tone::Critical => "bg-red-500",
            Tone::Neutral => "bg-gray-400",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub name: Option<String>,
}

/// The signed-in user as handed over by the auth layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserProfile {
    fn name(&self) -> Option<&str> {
        self.user_metadata
            .as_ref()
            .and_then(|meta| meta.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.is_empty())
    }

    /// Name shown in the user menu
    pub fn display_name(&self) -> &str {
        self.name().unwrap_or("User")
    }

    /// Up to two avatar letters, from the name or else the email
    pub fn initials(&self) -> String {
        if let Some(name) = self.name() {
            let letters: String = name
                .split(' ')
                .filter_map(|word| word.chars().next())
                .collect();
            return letters.to_uppercase().chars().take(2).collect();
        }
        if let Some(email) = self.email() {
            return email.chars().take(2).collect::<String>().to_uppercase();
        }
        "U".to_string()
    }
}

/// Requests left in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub remaining: u32,
    pub total: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            remaining: 50,
            total: 100,
        }
    }
}

impl RateLimit {
    /// Green above 50% remaining, amber above 20%, red otherwise
    pub fn tone(&self) -> Tone {
        if self.total == 0 {
            return if self.remaining > 0 {
                Tone::Positive
            } else {
                Tone::Critical
            };
        }

        let percentage = f64::from(self.remaining) / f64::from(self.total) * 100.0;
        if percentage > 50.0 {
            Tone::Positive
        } else if percentage > 20.0 {
            Tone::Caution
        } else {
            Tone::Critical
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.remaining, self.total)
    }
}

/// Content policy state of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyStatus {
    #[default]
    Safe,
    Warning,
    Violation,
    #[serde(other)]
    Unknown,
}

impl PolicyStatus {
    pub fn tone(self) -> Tone {
        match self {
            PolicyStatus::Safe => Tone::Positive,
            PolicyStatus::Warning => Tone::Caution,
            PolicyStatus::Violation => Tone::Critical,
            PolicyStatus::Unknown => Tone::Neutral,
        }
    }
}

impl FromStr for PolicyStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "safe" => PolicyStatus::Safe,
            "warning" => PolicyStatus::Warning,
            "violation" => PolicyStatus::Violation,
            _ => PolicyStatus::Unknown,
        })
    }
}

/// Backend connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Connecting,
    Disconnected,
    #[serde(other)]
    Unknown,
}

impl ConnectionStatus {
    pub fn tone(self) -> Tone {
        match self {
            ConnectionStatus::Connected => Tone::Positive,
            ConnectionStatus::Connecting => Tone::Caution,
            ConnectionStatus::Disconnected => Tone::Critical,
            ConnectionStatus::Unknown => Tone::Neutral,
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "connected" => ConnectionStatus::Connected,
            "connecting" => ConnectionStatus::Connecting,
            "disconnected" => ConnectionStatus::Disconnected,
            _ => ConnectionStatus::Unknown,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVariant {
    Destructive,
    Secondary,
}

/// Deployment environment label, e.g. `sandbox` or `production`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment(pub String);

impl Default for Environment {
    fn default() -> Self {
        Self("sandbox".to_string())
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        self.0 == "production"
    }

    pub fn badge_variant(&self) -> BadgeVariant {
        if self.is_production() {
            BadgeVariant::Destructive
        } else {
            BadgeVariant::Secondary
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the header renders, computed in one place
#[derive(Debug, Clone, PartialEq)]
pub struct TopBarView {
    pub initials: String,
    pub display_name: String,
    pub email: Option<String>,
    pub rate_limit_label: String,
    pub rate_limit_class: &'static str,
    pub policy_indicator_class: &'static str,
    pub connection_class: &'static str,
    pub environment_label: String,
    pub environment_badge: BadgeVariant,
    pub search_query: String,
    pub search_placeholder: &'static str,
}

pub const SEARCH_PLACEHOLDER: &str = "Search conversations and documents...";

type LogoutCallback<'a> = Box<dyn Fn() + 'a>;
type SearchCallback<'a> = Box<dyn FnMut(&str) + 'a>;

/// Top bar inputs and callbacks
#[derive(Default)]
pub struct TopBar<'a> {
    pub user: Option<UserProfile>,
    pub rate_limit: RateLimit,
    pub policy_status: PolicyStatus,
    pub connection_status: ConnectionStatus,
    pub environment: Environment,
    search_query: String,
    on_logout: Option<LogoutCallback<'a>>,
    on_search: Option<SearchCallback<'a>>,
}

impl<'a> TopBar<'a> {
    pub fn new(user: Option<UserProfile>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub fn on_logout(mut self, callback: impl Fn() + 'a) -> Self {
        self.on_logout = Some(Box::new(callback));
        self
    }

    pub fn on_search(mut self, callback: impl FnMut(&str) + 'a) -> Self {
        self.on_search = Some(Box::new(callback));
        self
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Update the search text and notify the search callback
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        if let Some(callback) = self.on_search.as_mut() {
            callback(self.search_query.as_str());
        }
    }

    /// "Sign out" was chosen in the user menu
    pub fn logout(&self) {
        match &self.on_logout {
            Some(callback) => callback(),
            None => tracing::debug!("Logout requested without a handler"),
        }
    }

    pub fn view(&self) -> TopBarView {
        let user = self.user.clone().unwrap_or_default();
        TopBarView {
            initials: user.initials(),
            display_name: user.display_name().to_string(),
            email: user.email.clone(),
            rate_limit_label: self.rate_limit.label(),
            rate_limit_class: self.rate_limit.tone().text_class(),
            policy_indicator_class: self.policy_status.tone().bg_class(),
            connection_class: self.connection_status.tone().text_class(),
            environment_label: self.environment.to_string(),
            environment_badge: self.environment.badge_variant(),
            search_query: self.search_query.clone(),
            search_placeholder: SEARCH_PLACEHOLDER,
        }
    }
}
