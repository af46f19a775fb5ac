//! A MiniSat-style CDCL solver and its incremental interface for d-DNNF compilation.

pub mod clause;
pub mod config;
pub mod core;
pub mod dnnf;
pub mod heap;

pub use self::config::SolverConfig;
pub use self::core::{Solver, SolverStats};
pub use self::dnnf::DnnfSolver;
