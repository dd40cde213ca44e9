pub mod message_repository;
pub mod thread_repository;
