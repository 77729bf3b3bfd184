pub mod controller;
pub mod models;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod settings;
pub mod stats;
pub mod telemetry;
pub mod validator;
