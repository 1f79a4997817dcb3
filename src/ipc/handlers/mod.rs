pub mod analytics;
pub mod auth;
pub mod classes;
pub mod core;
pub mod marks;
pub mod remedial;
pub mod students;
