//! Background loops for continuous processing.

pub mod audit_persist_loop;
pub mod notam_sweep_loop;
