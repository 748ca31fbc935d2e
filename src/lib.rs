//! SileenSystem administration tools
//!
//! Library behind the `setup-db`, `fix-fk` and `seed-boutique` binaries:
//! schema bootstrap, repair of the `stock_movements` foreign key and the
//! boutique catalog seeder, all against a MySQL server.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod repair;
pub mod report;
pub mod schema;
pub mod seed;
pub mod sql_script;

#[cfg(test)]
mod test_writer;

pub use errors::{AdminError, AdminResult, MySqlErrorCode};
