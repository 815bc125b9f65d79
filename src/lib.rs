//! Library crate for quizlink-back, exposing modules for binaries and integration tests.

pub mod auth;
mod config;
pub mod dao;
mod dto;
mod error;
pub mod routes;
pub mod services;
pub mod state;
