use core::fmt;
use serde::{Deserialize, Serialize};

/// Outcome kind reported by the chat log for an enhance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Success,
    Keep,
    Destroy,
    /// The game posted its "still enhancing, wait" notice instead of a result.
    Waiting,
    Unknown,
}

impl Event {
    pub const ALL: [Event; 5] = [
        Event::Success,
        Event::Keep,
        Event::Destroy,
        Event::Waiting,
        Event::Unknown,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Event::Success => "success",
            Event::Keep => "keep",
            Event::Destroy => "destroy",
            Event::Waiting => "waiting",
            Event::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn serde_uses_lowercase_labels() {
        for event in Event::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
        }
    }
}
