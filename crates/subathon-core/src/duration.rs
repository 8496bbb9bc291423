//! Duration parsing and clock formatting.
//!
//! Parsing accepts the two shapes chat users actually type:
//!
//! ```text
//! 02:15:30   15:30          (colon form, positional)
//! 1h30m      90s   2m 10    (unit form, bare digits are seconds)
//! ```
//!
//! Anything else degrades to `0`, which callers treat as "invalid".

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;

/// Parse a duration string into whole seconds.
///
/// Never fails: empty input, input without digits, and overflowing values
/// all degrade (to `0` or a saturated sum respectively).
pub fn parse_duration(input: &str) -> u64 {
    let s = input.trim().to_ascii_lowercase();
    if s.is_empty() {
        return 0;
    }
    if let Some(secs) = parse_colon_form(&s) {
        return secs;
    }
    parse_unit_form(&s)
}

/// `MM:SS` or `H?H:MM:SS`, one or two digits per field.
/// Field magnitudes are not bounded, so "90:00" is 90 minutes.
fn parse_colon_form(s: &str) -> Option<u64> {
    let fields: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&fields.len()) {
        return None;
    }
    let mut values = Vec::with_capacity(fields.len());
    for field in &fields {
        if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        values.push(field.parse::<u64>().ok()?);
    }
    match values.as_slice() {
        [m, s] => Some(m * SECS_PER_MINUTE + s),
        [h, m, s] => Some(h * SECS_PER_HOUR + m * SECS_PER_MINUTE + s),
        _ => None,
    }
}

/// Sums every `<digits>[ws]*[h|m|s]?` group, skipping any other characters.
fn parse_unit_form(s: &str) -> u64 {
    let bytes = s.as_bytes();
    let mut total: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let mut value: u64 = 0;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            value = value
                .saturating_mul(10)
                .saturating_add(u64::from(bytes[i] - b'0'));
            i += 1;
        }
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        let unit = match bytes.get(j) {
            Some(b'h') => Some(SECS_PER_HOUR),
            Some(b'm') => Some(SECS_PER_MINUTE),
            Some(b's') => Some(1),
            _ => None,
        };
        let multiplier = match unit {
            Some(m) => {
                i = j + 1;
                m
            }
            None => 1,
        };
        total = total.saturating_add(value.saturating_mul(multiplier));
    }
    total
}

/// Format seconds as `[D:]H:MM:SS`.
///
/// Hours are zero-padded only when a day component is shown. Fractions are
/// floored. Negative values render their magnitude with a trailing `-`.
pub fn format_clock(seconds: f64) -> String {
    let negative = seconds < 0.0;
    let mut s = if seconds.is_finite() {
        seconds.abs().floor() as u64
    } else {
        0
    };
    let d = s / SECS_PER_DAY;
    s -= d * SECS_PER_DAY;
    let h = s / SECS_PER_HOUR;
    s -= h * SECS_PER_HOUR;
    let m = s / SECS_PER_MINUTE;
    s -= m * SECS_PER_MINUTE;

    let mut out = if d > 0 {
        format!("{d}:{h:02}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}")
    };
    if negative {
        out.push('-');
    }
    out
}

/// Compact human form for feedback text: `1h 30m`, `45s`, `0s`.
pub fn human_delta(seconds: f64) -> String {
    let s = if seconds.is_finite() {
        seconds.floor().abs() as u64
    } else {
        0
    };
    let h = s / SECS_PER_HOUR;
    let m = (s % SECS_PER_HOUR) / SECS_PER_MINUTE;
    let ss = s % SECS_PER_MINUTE;

    let mut parts = Vec::with_capacity(3);
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 {
        parts.push(format!("{m}m"));
    }
    if ss > 0 || (h == 0 && m == 0) {
        parts.push(format!("{ss}s"));
    }
    parts.join(" ")
}
