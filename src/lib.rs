//! sftp-relay library
//!
//! Reconciles file trees between SFTP origin/destination pairs: enumerate both
//! sides, copy what the destination lacks, repeat until converged.

pub mod backend;
pub mod cli;
pub mod config;
pub mod connect;
pub mod copy;
pub mod diff;
pub mod fs_enum;
pub mod local;
pub mod logger;
pub mod orchestrator;
pub mod pause;
pub mod progress;
pub mod reconcile;
pub mod remote;
pub mod sftp;
pub mod url;

#[cfg(test)]
mod testutil;
