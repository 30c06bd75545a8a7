//! Reading outcomes out of the append-only chat transcript.

mod markers;
mod parser;

pub use markers::{ENHANCE_COMMAND, SELL_COMMAND};
pub use parser::{
    command_result_not_ready, enhance_result_not_ready, parse_amount, parse_latest_state,
    parse_window,
};
