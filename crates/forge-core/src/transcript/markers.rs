use std::sync::OnceLock;

use regex::Regex;

use crate::model::event::Event;

/// Chat command that triggers an enhance attempt.
pub const ENHANCE_COMMAND: &str = "/강화";
/// Chat command that sells the live item.
pub const SELL_COMMAND: &str = "/판매";

/// Event phrases in classification priority order.
const EVENT_PHRASES: [(Event, &str); 4] = [
    (Event::Waiting, r"강화\s*중이니\s*잠깐\s*기다리도록"),
    (Event::Destroy, r"강화\s*파괴"),
    (Event::Success, r"강화\s*성공"),
    (Event::Keep, r"강화\s*(?:유지|실패)"),
];

pub(crate) struct Markers {
    any_event: Regex,
    events: Vec<(Event, Regex)>,
    pub(crate) gold: Regex,
    pub(crate) spent: Regex,
    pub(crate) tier: Regex,
    pub(crate) transition: Regex,
}

impl Markers {
    pub(crate) fn get() -> &'static Markers {
        static MARKERS: OnceLock<Markers> = OnceLock::new();
        MARKERS.get_or_init(Markers::compile)
    }

    fn compile() -> Self {
        let alternation = EVENT_PHRASES
            .iter()
            .map(|(_, pattern)| format!("(?:{pattern})"))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            any_event: compile(&alternation),
            events: EVENT_PHRASES
                .iter()
                .map(|(event, pattern)| (*event, compile(pattern)))
                .collect(),
            gold: compile(r"남은\s*골드:\s*([\d,]+)G"),
            spent: compile(r"사용\s*골드:\s*-([\d,]+)G"),
            tier: compile(r"\[\+(\d+)\]"),
            transition: compile(r"\+(\d+)\s*→\s*\+(\d+)"),
        }
    }

    /// Byte offset where the last event phrase starts.
    pub(crate) fn last_event_start(&self, text: &str) -> Option<usize> {
        self.any_event.find_iter(text).last().map(|m| m.start())
    }

    pub(crate) fn has_event(&self, text: &str) -> bool {
        self.any_event.is_match(text)
    }

    /// Highest-priority event phrase present in `window`.
    pub(crate) fn classify(&self, window: &str) -> Option<Event> {
        self.events
            .iter()
            .find(|(_, pattern)| pattern.is_match(window))
            .map(|(event, _)| *event)
    }
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid marker pattern {pattern:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_prefers_waiting_then_destroy() {
        let markers = Markers::get();
        assert_eq!(
            markers.classify("강화 성공 ... 강화 중이니 잠깐 기다리도록"),
            Some(Event::Waiting)
        );
        assert_eq!(
            markers.classify("강화 성공 강화 파괴"),
            Some(Event::Destroy)
        );
        assert_eq!(markers.classify("강화 실패"), Some(Event::Keep));
        assert_eq!(markers.classify("강화  유지"), Some(Event::Keep));
        assert_eq!(markers.classify("판매 완료"), None);
    }

    #[test]
    fn finds_start_of_last_phrase() {
        let text = "강화 파괴\n...\n강화 성공";
        let start = Markers::get().last_event_start(text).unwrap();
        assert_eq!(&text[start..], "강화 성공");
        assert_eq!(Markers::get().last_event_start("hello"), None);
    }
}
