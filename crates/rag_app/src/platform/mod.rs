pub mod app;
pub mod effects;
pub mod error;
pub mod logging;
pub mod session;
pub mod ui;
