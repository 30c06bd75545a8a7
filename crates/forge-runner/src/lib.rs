pub mod config;
pub mod logging;
pub mod session;
pub mod stats;
pub mod surface;
