pub mod alerts;
pub mod init;
pub mod seed;
pub mod tenant;
