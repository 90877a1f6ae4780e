pub mod auth;
pub mod bot;
pub mod error;
pub mod model;
pub mod parse;
pub mod secrets;
pub mod stats;
pub mod store;
pub mod telegram;

pub use bot::{Bot, Inbound};
pub use error::{Result, ScoreError};
pub use model::*;
pub use store::{BackendConfig, ScoreStore};
