//! Code index for Tessera workspaces.
//!
//! A heuristic keyword index over file paths, extracted symbols and short
//! content snippets. It helps agents find relevant files by concept; it
//! does not understand code.

pub mod index;
pub mod symbols;

pub use index::{CodeIndex, IndexEntry, SearchHit};
