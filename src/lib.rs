//! # Nightglow Library
//!
//! Coordination core for a circadian color overlay: every open page is tinted
//! with a color temperature that follows a three-period daily schedule, and a
//! settings popup can preview periods or change the schedule live.
//!
//! ## Architecture
//!
//! The contexts of a running instance never share memory; they coordinate
//! through the [`store::Store`] and its change notifications, plus
//! fire-and-forget [`messaging::Message`]s.
//!
//! - **Entry Point**: [`Nightglow`] builder and its [`nightglow::Running`] handle
//! - **Schedule**: `core::period` pure period math, `core::resolver` background
//!   resolution of the live temperature
//! - **Pages**: `overlay` per-page controller, color conversion and animation
//! - **Popup**: `popup` preview/forced-override state machine
//! - **Storage**: `store` key/value store with change notifications and a
//!   JSON file backend
//! - **Configuration**: `config` TOML defaults and timings
//! - **CLI**: `args` and `commands`
//! - **Infrastructure**: `common` logging, constants and utilities, `time`
//!   clock abstraction

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

pub mod args;
pub mod commands;
pub mod config;
pub mod core;
pub mod messaging;
pub mod nightglow;
pub mod overlay;
pub mod popup;
pub mod store;
pub mod time;

pub use crate::nightglow::{Nightglow, Running};
