//! Domain models for the schema ledger.
//!
//! # Core Concepts
//!
//! ## Term tree
//!
//! - [`TermSet`]: a schema root or a named grouping inside one. Roots carry a
//!   version, children point at their parent through [`NodeKind::Child`].
//! - [`Term`]: a leaf field definition owned by exactly one term set.
//!
//! Every node carries an iri derived from its ancestry (see [`crate::iri`]).
//!
//! ## Ledgers
//!
//! - [`SchemaLedgerEntry`]: one uploaded schema definition and the root of its tree.
//! - [`TransformationLedgerEntry`]: a mapping specification between two roots.

mod ledger;
mod term;
mod term_set;
mod transformation;

pub use ledger::*;
pub use term::*;
pub use term_set::*;
pub use transformation::*;
