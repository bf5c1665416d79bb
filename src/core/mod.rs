//! Core modules of the AKR enforcement engine.
//!
//! Leaf first: the parser and schema registry feed the validation engine,
//! which the auto-fix engine, session cache and write gate build on.

pub mod autofix;
pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod gate;
pub mod output;
pub mod paths;
pub mod provenance;
pub mod rpc;
pub mod scaffold;
pub mod schema;
pub mod templates;
pub mod time;
pub mod validate;
pub mod vcs;
