//! Meal-photo nutrition logging service.
//!
//! Accepts photographed meals over HTTP, screens them with a local
//! food/non-food model, extracts nutrition estimates through a cloud
//! vision-language provider and logs them in SQLite. Requests made while no
//! network is available are queued durably and replayed, oldest first, once
//! connectivity returns.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;
