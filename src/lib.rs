pub mod api;
pub mod config;
pub mod event;
pub mod eventstore;
pub mod sourceregistry;
pub mod storage;
pub mod uaparser;
