//! Infrastructure layer: audit log, inventory ledger, workflow engine,
//! vendor coordination, read models and configuration.

pub mod audit_log;
pub mod config;
pub mod inventory_ledger;
pub mod projections;
pub mod store;
pub mod vendor;
pub mod workers;
pub mod workflow;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
pub(crate) mod test_support;
