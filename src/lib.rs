pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod repository;
pub mod service;
pub mod sync;
