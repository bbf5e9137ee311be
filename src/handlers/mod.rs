//! HTTP handlers for model administration and record CRUD.

pub mod models;
pub mod records;
