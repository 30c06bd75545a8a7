#![deny(warnings)]
//! Planning, transcript parsing and a simulated chat for the enhance game.

pub mod model;
pub mod planner;
pub mod sim;
pub mod transcript;
