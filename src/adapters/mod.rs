//! Adapters for the trackers the board syncs with.

pub mod plugins;
