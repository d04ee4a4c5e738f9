pub mod analytics;
pub mod bands;
pub mod calc;
pub mod cohort;
pub mod db;
pub mod ipc;
pub mod store;
pub mod students;
