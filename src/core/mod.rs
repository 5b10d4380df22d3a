pub mod magnet;
pub mod manager;
pub mod record;
pub mod schedule;
pub mod torrent_info;
