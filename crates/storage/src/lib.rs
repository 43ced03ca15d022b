#![forbid(unsafe_code)]

pub mod mapping;
pub mod remote;
pub mod repository;
