//! Database queries

pub mod property;
pub mod room;
