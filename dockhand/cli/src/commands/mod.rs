pub mod container_start;
pub mod deploy;
pub mod health;
pub mod init;
pub mod rollback;
pub mod status;
