pub mod event;
pub mod state;
pub mod table;
pub mod tier;
