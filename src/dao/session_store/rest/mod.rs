//! Hosted-store backend speaking the PostgREST wire dialect over HTTP.

mod config;
mod error;
mod models;
mod store;

pub use config::RestConfig;
pub use error::{RestDaoError, RestResult};
pub use store::RestSessionStore;
