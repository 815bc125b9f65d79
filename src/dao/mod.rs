//! Data access layer: entities, the storage abstraction, and the hosted REST
//! store backend.

pub mod models;
pub mod session_store;
pub mod storage;
