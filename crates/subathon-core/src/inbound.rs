//! Normalization of raw overlay-host events.
//!
//! Hosts deliver loosely shaped JSON: the same value may be called `amount`
//! or `count`, `tier` or `plan`, and the payload may sit under `data` or at
//! the top level. All of that guesswork lives here. Handlers only ever see
//! the fixed [`InboundEvent`] variants.
//!
//! Accepted envelope:
//!
//! ```text
//! { "listener": "message-received", "event": { "data": { "text": "!addtime 5m", ... } } }
//! { "listener": "subscriber-latest", "event": { "type": "subscriber", "data": { "tier": "2000" } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::role::{Actor, ActorFields};
use crate::tier::Tier;

const CHAT_LISTENER: &str = "message-received";

/// Subscription payload after normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Gifted (single or bulk) rather than bought by the recipient.
    pub gifted: bool,
    /// Number of gifted subs; `None` when the payload did not say.
    pub count: Option<u32>,
    pub is_prime: bool,
    /// Raw tier/plan string such as `"2000"` or `"tier3"`.
    pub plan: Option<String>,
    /// Cumulative months for resubs.
    pub months: Option<u32>,
}

impl Subscription {
    pub fn tier(&self) -> Tier {
        Tier::resolve(self.is_prime, self.plan.as_deref())
    }
}

/// One inbound event, in one of the four shapes the timer reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    ChatMessage { actor: Actor, text: String },
    Subscription { actor: Actor, subscription: Subscription },
    Cheer { actor: Actor, bits: f64 },
    Tip { actor: Actor, amount: f64 },
}

impl InboundEvent {
    /// Map a host envelope onto an [`InboundEvent`].
    ///
    /// Returns `None` for anything unrecognised; that is not an error.
    pub fn normalize(envelope: &Value) -> Option<Self> {
        let listener = envelope.get("listener").and_then(Value::as_str).unwrap_or("");
        let event = envelope.get("event")?;

        if listener == CHAT_LISTENER {
            return chat(payload(event));
        }

        match event.get("type").and_then(Value::as_str)? {
            "message" => chat(payload(event)),
            "subscriber" => Some(subscription(payload(event))),
            "cheer" => Some(cheer(payload(event))),
            "tip" => Some(tip(payload(event))),
            _ => None,
        }
    }

    pub fn actor(&self) -> &Actor {
        match self {
            InboundEvent::ChatMessage { actor, .. }
            | InboundEvent::Subscription { actor, .. }
            | InboundEvent::Cheer { actor, .. }
            | InboundEvent::Tip { actor, .. } => actor,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::ChatMessage { .. } => "chat_message",
            InboundEvent::Subscription { .. } => "subscription",
            InboundEvent::Cheer { .. } => "cheer",
            InboundEvent::Tip { .. } => "tip",
        }
    }
}

/// `event.data` when present, else the event itself.
fn payload(event: &Value) -> &Value {
    match event.get("data") {
        Some(data) if data.is_object() => data,
        _ => event,
    }
}

fn chat(d: &Value) -> Option<InboundEvent> {
    let text = text_of(first(d, &["text", "message", "body"])?)?;
    if text.trim().is_empty() {
        return None;
    }

    let tags = d.get("tags");
    let badges = tags.and_then(|t| t.get("badges")).map(badges_of);
    let mod_flag = tags
        .and_then(|t| t.get("mod"))
        .map(|m| matches!(m, Value::Bool(true)) || m.as_u64() == Some(1) || m.as_str() == Some("1"))
        .unwrap_or(false);
    let role = first(d, &["role", "userRole"]).and_then(text_of);

    let display_name = str_field(d, "displayName");
    let nick = str_field(d, "nick");
    let username = str_field(d, "username");
    let channel = str_field(d, "channel");

    let actor = Actor::classify(&ActorFields {
        display_name,
        nick,
        username,
        channel,
        role: role.as_deref(),
        badges: badges.as_deref(),
        mod_flag,
    });
    Some(InboundEvent::ChatMessage { actor, text })
}

fn subscription(d: &Value) -> InboundEvent {
    let gifted = ["gifted", "bulkGifted", "isGift"]
        .iter()
        .any(|k| d.get(*k).is_some_and(truthy));
    let count = first(d, &["amount", "count"]).and_then(count_of);
    let is_prime = ["isPrime", "prime"].iter().any(|k| d.get(*k).is_some_and(truthy));
    let plan = first(d, &["tier", "plan"]).and_then(text_of);
    let months = first(d, &["months", "amount"]).and_then(count_of);

    InboundEvent::Subscription {
        actor: supporter(d),
        subscription: Subscription {
            gifted,
            count,
            is_prime,
            plan,
            months,
        },
    }
}

fn cheer(d: &Value) -> InboundEvent {
    let bits = first(d, &["amount", "bits"]).and_then(number_of).unwrap_or(0.0);
    InboundEvent::Cheer {
        actor: supporter(d),
        bits,
    }
}

fn tip(d: &Value) -> InboundEvent {
    let amount = first(d, &["amount"]).and_then(number_of).unwrap_or(0.0);
    InboundEvent::Tip {
        actor: supporter(d),
        amount,
    }
}

/// Supporters are only named, never role-checked.
fn supporter(d: &Value) -> Actor {
    let name = ["displayName", "name", "username", "sender"]
        .iter()
        .find_map(|k| str_field(d, k).filter(|s| !s.is_empty()))
        .unwrap_or("Someone");
    Actor::new(name)
}

/// First field among `keys` holding a truthy value.
fn first<'a>(d: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| d.get(*k)).find(|v| truthy(v))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn str_field<'a>(d: &'a Value, key: &str) -> Option<&'a str> {
    d.get(key).and_then(Value::as_str)
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_of(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn count_of(v: &Value) -> Option<u32> {
    let n = number_of(v)?;
    (n >= 1.0).then(|| n.min(f64::from(u32::MAX)) as u32)
}

/// Badges arrive as `"moderator/1,subscriber/12"`, a list of names, or a
/// list of `{ "type": ... }` objects.
fn badges_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Object(_) => item.get("type").and_then(text_of),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_from_message_listener() {
        let raw = json!({
            "listener": "message-received",
            "event": { "data": {
                "text": "!addtime 5m",
                "displayName": "Helper",
                "tags": { "badges": "moderator/1", "mod": "1" }
            }}
        });
        match InboundEvent::normalize(&raw) {
            Some(InboundEvent::ChatMessage { actor, text }) => {
                assert_eq!(text, "!addtime 5m");
                assert_eq!(actor.name, "Helper");
                assert!(actor.is_moderator);
                assert!(!actor.is_broadcaster);
            }
            other => panic!("Expected ChatMessage, got {other:?}"),
        }
    }

    #[test]
    fn chat_by_event_type_detects_broadcaster_by_channel() {
        let raw = json!({
            "listener": "",
            "event": { "type": "message", "message": "!subtime 1m", "username": "me", "channel": "me" }
        });
        let ev = InboundEvent::normalize(&raw).unwrap();
        assert!(ev.actor().is_broadcaster);
    }

    #[test]
    fn badge_objects_are_read() {
        let raw = json!({
            "listener": "message-received",
            "event": { "data": { "text": "hi", "tags": { "badges": [{ "type": "broadcaster" }] } } }
        });
        assert!(InboundEvent::normalize(&raw).unwrap().actor().is_broadcaster);
    }

    #[test]
    fn empty_chat_text_is_ignored() {
        let raw = json!({ "listener": "message-received", "event": { "data": { "text": "  " } } });
        assert!(InboundEvent::normalize(&raw).is_none());
    }

    #[test]
    fn gifted_subscription_reads_amount_as_count() {
        let raw = json!({
            "listener": "subscriber-latest",
            "event": { "type": "subscriber", "data": {
                "bulkGifted": true, "amount": 5, "tier": "2000", "sender": "Gifter"
            }}
        });
        match InboundEvent::normalize(&raw) {
            Some(InboundEvent::Subscription { actor, subscription }) => {
                assert!(subscription.gifted);
                assert_eq!(subscription.count, Some(5));
                assert_eq!(subscription.tier(), Tier::T2);
                assert_eq!(actor.name, "Gifter");
            }
            other => panic!("Expected Subscription, got {other:?}"),
        }
    }

    #[test]
    fn resub_months_and_prime() {
        let raw = json!({
            "event": { "type": "subscriber", "months": 6, "plan": "Prime", "name": "viewer" }
        });
        match InboundEvent::normalize(&raw) {
            Some(InboundEvent::Subscription { subscription, .. }) => {
                assert!(!subscription.gifted);
                assert_eq!(subscription.months, Some(6));
                assert_eq!(subscription.tier(), Tier::Prime);
            }
            other => panic!("Expected Subscription, got {other:?}"),
        }
    }

    #[test]
    fn cheer_and_tip_amounts_accept_strings() {
        let cheer = json!({ "event": { "type": "cheer", "data": { "bits": "250" } } });
        assert_eq!(
            InboundEvent::normalize(&cheer),
            Some(InboundEvent::Cheer { actor: Actor::new("Someone"), bits: 250.0 })
        );

        let tip = json!({ "event": { "type": "tip", "amount": 4.5, "username": "donor" } });
        assert_eq!(
            InboundEvent::normalize(&tip),
            Some(InboundEvent::Tip { actor: Actor::new("donor"), amount: 4.5 })
        );
    }

    #[test]
    fn unknown_types_are_ignored() {
        assert!(InboundEvent::normalize(&json!({ "event": { "type": "follower" } })).is_none());
        assert!(InboundEvent::normalize(&json!({ "event": {} })).is_none());
        assert!(InboundEvent::normalize(&json!({ "listener": "x" })).is_none());
        assert!(InboundEvent::normalize(&json!(42)).is_none());
    }
}
