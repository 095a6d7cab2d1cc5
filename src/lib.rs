//! docsync - documentation pages mirrored into a git-tracked Markdown tree
//!
//! This crate provides the core functionality for the `docsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Page, `NewPage`, navigation nodes)
//! - [`storage`] - SQLite page store with audit events
//! - [`sync`] - Markdown mirror: slugs, frontmatter, conversion, reconciliation
//! - [`git`] - Repository gateway (commit, push, pull)
//! - [`config`] - Database and repository resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
