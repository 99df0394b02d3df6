// Library surface for the CLI and the integration tests.
pub mod actions;
pub mod app_dirs;
pub mod builder;
pub mod clock;
pub mod config;
pub mod engine;
pub mod history;
pub mod identity;
pub mod mirror;
pub mod model;
pub mod position;
pub mod rest_timer;
pub mod runtime;
pub mod storage;
pub mod util;

pub use engine::{EndAction, EngineError, SessionEngine, SetInput};
