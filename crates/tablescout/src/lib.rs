//! # Table Scout
//!
//! Strategy-driven table discovery. Given a requirement document and the
//! fields it needs, Table Scout plans one search per conceptual group,
//! queries a table metadata index, and keeps only the tables whose schema
//! can supply that group's fields.
//!
//! The engine itself lives in [`tablescout_core`]; this crate configures it
//! and puts it behind a CLI and an HTTP tool server.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup (`SCOUT_LOG`) |
//! | [`http`] | JSON POST with retry and backoff |
//! | [`llm`] | OpenAI-compatible chat model for planning and judging |
//! | [`backend`] | Catalog and remote HTTP search backends |
//! | [`fields`] | Target fields from JSON or a document's field table |
//! | [`discover`] | Engine wiring and the `discover` / `plan` commands |
//! | [`traits`] | `Tool` trait, registry, and built-in tools |
//! | [`server`] | HTTP tool server |

pub mod backend;
pub mod config;
pub mod discover;
pub mod fields;
pub mod http;
pub mod llm;
pub mod logging;
pub mod server;
pub mod traits;
