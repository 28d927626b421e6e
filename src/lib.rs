//! Personal productivity library
//!
//! This library provides tasks with schedules and priorities, notes built from
//! text and media blocks, a focus timer, and background reminder loops that
//! turn due tasks and note reminders into notifications.

mod blocks;
mod cli;
mod config;
mod errors;
mod helper;
mod media;
mod note;
mod notifier;
mod repository;
mod review;
mod scheduler;
mod store;
mod task;
mod timer;
mod types;

// Re-export key components
pub use blocks::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use helper::*;
pub use media::*;
pub use note::*;
pub use notifier::*;
pub use repository::*;
pub use review::*;
pub use scheduler::*;
pub use store::*;
pub use task::*;
pub use timer::*;
pub use types::*;
