//! Event handlers: turn normalized inbound events into engine mutations.
//!
//! Handlers borrow the engine and configuration for the duration of one
//! event and run to completion. They never fail; anything malformed is a
//! no-op.

use std::time::Duration;

use serde::Serialize;

use crate::duration::{format_clock, human_delta, parse_duration};
use crate::events::Event;
use crate::inbound::{InboundEvent, Subscription};
use crate::role::{is_authorized, Actor};
use crate::storage::Config;
use crate::timer::{Sign, TimerEngine};

pub const INVALID_TIME_FEEDBACK: &str = "Invalid time. Try: 90s, 2m, 1h30m, 02:15:30";

const MIN_BITS_PER_SECOND: f64 = 1.0;
const MIN_TIP_PER_SECOND: f64 = 0.01;

/// Transient text for the render sink, with its auto-dismiss delay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub text: String,
    #[serde(with = "duration_ms")]
    pub dismiss_after: Duration,
}

/// What handling one event produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Handled {
    /// The engine changes, in order.
    pub events: Vec<Event>,
    pub feedback: Option<Feedback>,
}

impl Handled {
    pub fn is_mutation(&self) -> bool {
        !self.events.is_empty()
    }

    fn push(&mut self, event: Option<Event>) {
        self.events.extend(event);
    }
}

/// Dispatch one inbound event.
pub fn handle(engine: &mut TimerEngine, config: &Config, event: &InboundEvent, now_ms: u64) -> Handled {
    match event {
        InboundEvent::Subscription { subscription, .. } => {
            handle_subscription(engine, config, subscription, now_ms)
        }
        InboundEvent::Cheer { bits, .. } => handle_cheer(engine, config, *bits, now_ms),
        InboundEvent::Tip { amount, .. } => handle_tip(engine, config, *amount, now_ms),
        InboundEvent::ChatMessage { actor, text } => {
            handle_chat(engine, config, actor, text, now_ms)
        }
    }
}

pub fn handle_subscription(
    engine: &mut TimerEngine,
    config: &Config,
    sub: &Subscription,
    now_ms: u64,
) -> Handled {
    let tiers = &config.tiers;
    let grants = &config.grants;
    let mult = tiers.multiplier_for(sub.tier());
    let mut handled = Handled::default();

    if sub.gifted {
        let count = f64::from(sub.count.unwrap_or(1));
        let per_gift = if tiers.apply_to_gifts {
            grants.gift_sub_seconds * mult
        } else {
            grants.gift_sub_seconds
        };
        handled.push(engine.add_seconds(count * per_gift, now_ms));
        return handled;
    }

    handled.push(engine.add_seconds(grants.sub_seconds * mult, now_ms));

    // The first month is covered by the base grant.
    if let Some(months) = sub.months.filter(|m| *m > 1) {
        let per_month = if tiers.apply_to_resub_months {
            grants.resub_per_month_seconds * mult
        } else {
            grants.resub_per_month_seconds
        };
        handled.push(engine.add_seconds(f64::from(months - 1) * per_month, now_ms));
    }
    handled
}

pub fn handle_cheer(engine: &mut TimerEngine, config: &Config, bits: f64, now_ms: u64) -> Handled {
    let divisor = floored(config.grants.bits_per_second, MIN_BITS_PER_SECOND);
    let mut handled = Handled::default();
    handled.push(engine.add_seconds((bits / divisor).floor(), now_ms));
    handled
}

pub fn handle_tip(engine: &mut TimerEngine, config: &Config, amount: f64, now_ms: u64) -> Handled {
    let divisor = floored(config.grants.tip_per_second, MIN_TIP_PER_SECOND);
    let mut handled = Handled::default();
    handled.push(engine.add_seconds((amount / divisor).floor(), now_ms));
    handled
}

/// `!addtime` / `!subtime`.
///
/// Unauthorized callers get no feedback at all; an unparsable duration from
/// an authorized caller gets a usage hint.
pub fn handle_chat(
    engine: &mut TimerEngine,
    config: &Config,
    actor: &Actor,
    text: &str,
    now_ms: u64,
) -> Handled {
    let commands = &config.commands;
    let mut handled = Handled::default();
    if !commands.enabled {
        return handled;
    }

    let Some((sign, arg)) = match_command(text, &commands.add_command, &commands.sub_command)
    else {
        return handled;
    };

    if !is_authorized(actor, commands.who_can_use) {
        tracing::debug!(user = %actor.name, "ignoring time command from unauthorized user");
        return handled;
    }

    let seconds = parse_duration(arg);
    if seconds == 0 {
        handled.feedback = feedback(config, INVALID_TIME_FEEDBACK.to_string());
        return handled;
    }

    let seconds = seconds as f64;
    handled.push(engine.apply_command_delta(seconds, sign, now_ms));

    let op = match sign {
        Sign::Add => "added",
        Sign::Subtract => "removed",
    };
    let text = commands
        .feedback_format
        .replacen("{user}", &actor.name, 1)
        .replacen("{op}", op, 1)
        .replacen("{delta}", &human_delta(seconds), 1)
        .replacen("{remaining}", &format_clock(engine.remaining_secs()), 1);
    handled.feedback = feedback(config, text);
    handled
}

/// Case-insensitive match of `text` against the command names: exact, or
/// followed by a space. Returns the direction and the untrimmed-case argument.
fn match_command<'a>(text: &'a str, add: &str, sub: &str) -> Option<(Sign, &'a str)> {
    let text = text.trim();
    [(Sign::Add, add), (Sign::Subtract, sub)]
        .into_iter()
        .find_map(|(sign, cmd)| strip_command(text, cmd).map(|arg| (sign, arg)))
}

fn strip_command<'a>(text: &'a str, cmd: &str) -> Option<&'a str> {
    let cmd = cmd.trim();
    if cmd.is_empty() || text.len() < cmd.len() || !text.is_char_boundary(cmd.len()) {
        return None;
    }
    let (head, rest) = text.split_at(cmd.len());
    if head.to_lowercase() != cmd.to_lowercase() {
        return None;
    }
    if rest.is_empty() {
        Some(rest)
    } else if rest.starts_with(' ') {
        Some(rest.trim())
    } else {
        None
    }
}

fn feedback(config: &Config, text: String) -> Option<Feedback> {
    config.commands.feedback.then(|| Feedback {
        text,
        dismiss_after: Duration::from_millis(config.commands.feedback_dismiss_ms),
    })
}

fn floored(value: f64, min: f64) -> f64 {
    if value.is_finite() {
        value.max(min)
    } else {
        min
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
