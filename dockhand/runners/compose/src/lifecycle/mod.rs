pub mod container_start;
pub mod rollback;
