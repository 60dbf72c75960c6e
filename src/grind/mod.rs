//! Keypair Search
//!
//! Drives the external `solana-keygen grind` process for one validated
//! pattern and reports how it ended.

pub mod command;
pub mod output;
pub mod progress;
pub mod supervisor;

#[cfg(all(test, unix))]
pub(crate) mod testing;

pub use command::{grind_args, preflight};
pub use progress::{cosmetic_fraction, render_bar};
pub use supervisor::{
    Generation, GenerationOutcome, GenerationSupervisor, ProgressSink, ProgressTick,
    SupervisorHandle,
};
