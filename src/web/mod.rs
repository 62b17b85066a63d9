//! Browser form and JSON API.
//!
//! ```text
//! GET  /               HTML form
//! GET  /api/status     model server connectivity
//! GET  /api/models     models for the dropdown + preselected entry
//! GET  /api/defaults   values restored by the Clear button
//! POST /api/optimize   run the flow, return answer/status/history
//! ```
//!
//! Model calls block, so handlers move them onto tokio's blocking pool.

mod routes;

pub use routes::{AppState, router, serve};
