pub mod analytics;
pub mod bands;
pub mod cohorts;
pub mod core;
pub mod marks;
pub mod reports;
pub mod roster;
pub mod students;
