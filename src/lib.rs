// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod admin;
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod lifecycle;
pub mod logging;
pub mod mission;
pub mod runtime;
pub mod session;
pub mod store;
pub mod util;
