#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Relief simulation engine: synthetic disaster scenarios, the episode trainer, and the
//! policy demonstration.

/// Seeded disaster scenario simulator.
#[path = "../simulator.rs"]
pub mod simulator;

/// Episode loop, progress reporting, and demonstrations.
#[path = "../trainer.rs"]
pub mod trainer;

/// Engine entry point tying configuration, simulator, and trainer together.
#[path = "../main.rs"]
pub mod runtime;

pub use runtime::{TrainingEngine, TrainingEngineBuilder};
pub use simulator::DisasterSimulator;
pub use trainer::{Episode, Trainer, TrainingReport};
