use regex::Regex;

use crate::model::event::Event;
use crate::model::state::State;
use crate::model::tier::Tier;
use crate::transcript::markers::{ENHANCE_COMMAND, Markers};

/// Portion of the transcript that belongs to the most recent result: everything
/// from the last event phrase onward, or the whole text if there is none.
/// Phrases and tier markers before it were already consumed.
pub fn parse_window(text: &str) -> &str {
    match Markers::get().last_event_start(text) {
        Some(start) => &text[start..],
        None => text,
    }
}

/// Extract the latest observation from a chat transcript.
///
/// Returns `None` only when no remaining-gold figure appears anywhere.
pub fn parse_latest_state(text: &str, fallback: Tier) -> Option<State> {
    let markers = Markers::get();
    let window = parse_window(text);

    let gold = last_amount(&markers.gold, window).or_else(|| last_amount(&markers.gold, text))?;
    let spent = first_amount(&markers.spent, window).unwrap_or(0);

    let (event, tier) = match markers.classify(window) {
        Some(Event::Waiting) => (Event::Waiting, fallback),
        Some(Event::Destroy) => (Event::Destroy, Tier::ZERO),
        Some(Event::Success) => {
            let tier = transition_target(&markers.transition, window)
                .or_else(|| first_tier(&markers.tier, window))
                .unwrap_or(fallback);
            (Event::Success, tier)
        }
        Some(Event::Keep) => (
            Event::Keep,
            first_tier(&markers.tier, window).unwrap_or(fallback),
        ),
        Some(Event::Unknown) | None => (
            Event::Unknown,
            first_tier(&markers.tier, window).unwrap_or(fallback),
        ),
    };

    Some(State::new(gold, tier, event, spent))
}

/// True while the last `/강화` in the transcript has no event phrase after it.
pub fn enhance_result_not_ready(text: &str) -> bool {
    command_result_not_ready(text, ENHANCE_COMMAND)
}

/// True when `command` appears in the transcript and no event phrase follows its
/// last occurrence. A transcript without the command is never "not ready".
pub fn command_result_not_ready(text: &str, command: &str) -> bool {
    if command.is_empty() {
        return false;
    }
    match text.rfind(command) {
        Some(start) => !Markers::get().has_event(&text[start + command.len()..]),
        None => false,
    }
}

/// Parse a gold figure such as `1,234` into 1234.
pub fn parse_amount(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

fn last_amount(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).and_then(|m| parse_amount(m.as_str())))
        .last()
}

fn first_amount(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_amount(m.as_str()))
}

fn first_tier(pattern: &Regex, text: &str) -> Option<Tier> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_tier(m.as_str()))
}

fn transition_target(pattern: &Regex, text: &str) -> Option<Tier> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(2))
        .and_then(|m| parse_tier(m.as_str()))
}

// out-of-range levels are treated as missing
fn parse_tier(raw: &str) -> Option<Tier> {
    raw.parse::<u8>().ok().and_then(Tier::new)
}
