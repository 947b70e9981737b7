pub mod config;
pub mod controller;
pub mod detector;
pub mod dispatch;
pub mod messages;
pub mod registry;
pub mod routing;
pub mod topology;

/// Switch identifiers are dense in `1..=N` and fixed at startup.
pub type SwitchId = u32;
