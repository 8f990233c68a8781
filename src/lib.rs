// ABOUTME: Library module for bucket-reconciler
// ABOUTME: Exports the store layer, the diff/transfer/flat-file engines and the commands

pub mod cancel;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod diff;
pub mod error;
pub mod flatfile;
pub mod store;
pub mod transfer;
pub mod utils;
