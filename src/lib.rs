pub mod api;
pub mod field;
pub mod store;
pub mod strategic;
pub mod structural;
pub mod validation;
pub mod webhook;
pub mod workload;
