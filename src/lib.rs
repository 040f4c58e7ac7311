//! pathxp: experience allocation and progression engine for learning paths
//!
//! A fixed experience budget is distributed over problem and treasure nodes,
//! cumulative experience maps to realms and levels, and user progress can be
//! migrated between experience scales with backup and rollback.
//!
//! Layers, leaves first: [`domain`] (pure) → [`application`] (services and
//! the [`application::services::ExperienceSystem`] facade) →
//! [`infrastructure`] (I/O traits, stores, DI) → [`cli`].

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
