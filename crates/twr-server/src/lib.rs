pub mod api;
pub mod audit;
pub mod config;
pub mod loops;
pub mod persistence;
pub mod reference;
pub mod state;
