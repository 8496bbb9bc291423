//! Chat command role gating.

use serde::{Deserialize, Serialize};

/// Who may run the time-adjusting chat commands.
///
/// Stored as a plain string; any value other than `broadcaster` or
/// `everyone` means moderators and above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessPolicy {
    Broadcaster,
    ModeratorsAndAbove,
    Everyone,
}

impl AccessPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPolicy::Broadcaster => "broadcaster",
            AccessPolicy::ModeratorsAndAbove => "mods",
            AccessPolicy::Everyone => "everyone",
        }
    }
}

impl From<&str> for AccessPolicy {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "broadcaster" => AccessPolicy::Broadcaster,
            "everyone" => AccessPolicy::Everyone,
            _ => AccessPolicy::ModeratorsAndAbove,
        }
    }
}

impl From<String> for AccessPolicy {
    fn from(value: String) -> Self {
        AccessPolicy::from(value.as_str())
    }
}

impl From<AccessPolicy> for String {
    fn from(policy: AccessPolicy) -> Self {
        policy.as_str().to_string()
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        AccessPolicy::ModeratorsAndAbove
    }
}

/// Identity and role flags of whoever triggered an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub is_broadcaster: bool,
    pub is_moderator: bool,
}

/// Raw role signals as they appear on chat payloads, before classification.
#[derive(Debug, Clone, Default)]
pub struct ActorFields<'a> {
    pub display_name: Option<&'a str>,
    pub nick: Option<&'a str>,
    pub username: Option<&'a str>,
    pub channel: Option<&'a str>,
    pub role: Option<&'a str>,
    pub badges: Option<&'a str>,
    pub mod_flag: bool,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn moderator(name: impl Into<String>) -> Self {
        Self {
            is_moderator: true,
            ..Self::new(name)
        }
    }

    pub fn broadcaster(name: impl Into<String>) -> Self {
        Self {
            is_broadcaster: true,
            ..Self::new(name)
        }
    }

    /// Derive role flags from the signals a chat payload carries.
    pub fn classify(fields: &ActorFields<'_>) -> Self {
        let role = fields.role.unwrap_or_default().to_ascii_lowercase();
        let badges = fields.badges.unwrap_or_default().to_ascii_lowercase();
        let is_channel = |who: Option<&str>| match (who, fields.channel) {
            (Some(w), Some(c)) => !w.is_empty() && w == c,
            _ => false,
        };

        let is_broadcaster = role == "broadcaster"
            || badges.contains("broadcaster")
            || is_channel(fields.display_name)
            || is_channel(fields.username);
        let is_moderator =
            role == "moderator" || fields.mod_flag || badges.contains("moderator");

        let name = [fields.display_name, fields.nick, fields.username]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or("User")
            .to_string();

        Self {
            name,
            is_broadcaster,
            is_moderator,
        }
    }
}

/// Whether `actor` may invoke a gated command under `policy`.
pub fn is_authorized(actor: &Actor, policy: AccessPolicy) -> bool {
    match policy {
        AccessPolicy::Everyone => true,
        AccessPolicy::Broadcaster => actor.is_broadcaster,
        AccessPolicy::ModeratorsAndAbove => actor.is_broadcaster || actor.is_moderator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everyone_allows_anyone() {
        assert!(is_authorized(&Actor::new("viewer"), AccessPolicy::Everyone));
    }

    #[test]
    fn broadcaster_policy_rejects_moderators() {
        assert!(!is_authorized(&Actor::moderator("mod"), AccessPolicy::Broadcaster));
        assert!(is_authorized(&Actor::broadcaster("me"), AccessPolicy::Broadcaster));
    }

    #[test]
    fn mods_policy_allows_mods_and_broadcaster() {
        let policy = AccessPolicy::ModeratorsAndAbove;
        assert!(is_authorized(&Actor::moderator("mod"), policy));
        assert!(is_authorized(&Actor::broadcaster("me"), policy));
        assert!(!is_authorized(&Actor::new("viewer"), policy));
    }

    #[test]
    fn unknown_policy_strings_mean_mods() {
        assert_eq!(AccessPolicy::from("mods"), AccessPolicy::ModeratorsAndAbove);
        assert_eq!(AccessPolicy::from("vips"), AccessPolicy::ModeratorsAndAbove);
        assert_eq!(AccessPolicy::from("Everyone"), AccessPolicy::Everyone);
        let parsed: AccessPolicy = serde_json::from_str("\"broadcaster\"").unwrap();
        assert_eq!(parsed, AccessPolicy::Broadcaster);
    }

    #[test]
    fn classify_reads_badges_role_and_channel() {
        let a = Actor::classify(&ActorFields {
            display_name: Some("Streamer"),
            channel: Some("Streamer"),
            ..Default::default()
        });
        assert!(a.is_broadcaster);
        assert_eq!(a.name, "Streamer");

        let m = Actor::classify(&ActorFields {
            nick: Some("helper"),
            badges: Some("Moderator/1,subscriber/12"),
            ..Default::default()
        });
        assert!(m.is_moderator);
        assert!(!m.is_broadcaster);
        assert_eq!(m.name, "helper");

        let r = Actor::classify(&ActorFields {
            role: Some("BROADCASTER"),
            ..Default::default()
        });
        assert!(r.is_broadcaster);
        assert_eq!(r.name, "User");
    }
}
