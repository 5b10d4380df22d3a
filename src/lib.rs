//! Keeps torrents published on tracker sites up to date in torrent clients.
//!
//! A walk lists the registered torrents of every RPC backend, resolves each one to the
//! torrent currently published on its tracker page and swaps in the new release when the
//! info hash changed.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod network;
pub mod rpc;
pub mod toolbox;
pub mod tracker;
pub mod utils;
