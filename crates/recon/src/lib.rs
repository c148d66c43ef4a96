//! `vendstock-recon`: sales-report reconciliation engine.
//!
//! Pure engine crate: receives a raw sales export and a machine table
//! snapshot, returns the updated table plus a run summary. Persistence is
//! reached only through the [`store::MachineStore`] trait.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod model;
pub mod store;
pub mod table;

pub use config::ReconConfig;
pub use engine::{reconcile, run_against_store};
pub use error::{ParseError, ReconError, StoreError};
pub use model::{DocumentFormat, LocationKey, MachineRecord, ReconOutcome, ReconResult, ReconSummary};
pub use store::{MachineStore, MemoryStore, Snapshot, TableVersion};
