// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal tooling for Max for Live device assets.
//!
//! Two independent tools share this library:
//!
//! - `deploy-amxd` copies the newest versioned build of a device into a
//!   production or development deploy directory, and keeps an append-only
//!   history of every deployment. See [`deploy`].
//! - `max-styles-cleanup` strips style definitions that nothing references
//!   out of a patcher document, one nesting level at a time. See [`styles`].
//!
//! Both read the same optional TOML configuration file. See [`config`].

pub mod config;
pub mod deploy;
pub mod path;
pub mod styles;
