pub mod feed;
pub mod import;
pub mod init;
pub mod schedule;
