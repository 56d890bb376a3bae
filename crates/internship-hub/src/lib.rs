//! Internship placement coordination: the application workflow shared by students,
//! faculty supervisors, and hiring companies, plus the configuration, telemetry, and
//! error plumbing used by the service binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
