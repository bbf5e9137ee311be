//! RouteFactory: per-model record operations behind the permission gate.

mod records;
pub use records::{RecordRoutes, RouteFactory};
