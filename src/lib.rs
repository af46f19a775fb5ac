//! # ddnnf-rs: d-DNNF compilation in Rust
//!
//! **`ddnnf-rs`** compiles propositional formulas into **decomposable deterministic negation normal form (d-DNNF)**
//! and counts their models exactly.
//!
//! ## What is a d-DNNF?
//!
//! A formula in negation normal form is *decomposable* when the operands of every conjunction share no variables,
//! and *deterministic* when the operands of every disjunction are pairwise contradictory.
//! Together these properties make model counting linear in the size of the formula:
//! conjunctions multiply and disjunctions add.
//!
//! ## Key Features
//!
//! - **Factory-Centric Architecture**: All formulas are built through the [`FormulaFactory`][crate::formula::FormulaFactory],
//!   which hash-conses every node. Structurally equal formulas are the same [`Formula`][crate::formula::Formula] handle.
//! - **Top-Down Compilation**: The compiler follows the dtree of the CNF, decomposing independent sub-problems and
//!   expanding on separator variables, with a CDCL solver for propagation and clause learning.
//! - **Caching**: Compiled sub-problems are cached by their remaining clauses and undecided variables.
//! - **Cancellation**: A [`DnnfHandler`][crate::handler::DnnfHandler] can stop a compilation after any Shannon expansion.
//!
//! ## Basic Usage
//!
//! ```rust
//! use ddnnf_rs::formula::FormulaFactory;
//! use num_bigint::BigUint;
//!
//! // 1. Initialize the factory
//! let f = FormulaFactory::new();
//!
//! // 2. Create variables
//! let a = f.var("a");
//! let b = f.var("b");
//!
//! // 3. Build a formula: a OR b
//! let x = f.or([a, b]);
//!
//! // 4. Compile and count
//! let dnnf = f.compile_dnnf(x);
//! assert!(f.is_equivalent(dnnf.formula, x));
//! assert_eq!(dnnf.model_count(&f), BigUint::from(3u32));
//! ```
//!
//! ## Core Components
//!
//! - **[`formula`]**: The formula factory, formula kinds and assignments.
//! - **[`transform`]**: NNF and CNF conversion, restriction, subsumption and backbone simplification.
//! - **[`solver`]**: The CDCL solver and the incremental interface used by the compiler.
//! - **[`dtree`]**: Decomposition trees built from min-fill orderings of the [constraint graph][crate::graph].
//! - **[`compiler`]**: The CNF to d-DNNF compiler.
//! - **[`count`]**: Model counting on d-DNNF.

pub mod backbone;
pub mod bitset;
pub mod cache;
pub mod compiler;
pub mod count;
pub mod dnnf;
pub mod dtree;
pub mod formula;
pub mod graph;
pub mod handler;
pub mod sat;
pub mod solver;
pub mod transform;
pub mod types;
