//! OfferLab Digest: condensed research context
//!
//! Downstream stages need the research results, but re-injecting the full
//! JSON multiplies prompt cost. This crate renders a bounded text digest
//! and provides the token estimate used for context-window checks.

pub mod budget;
pub mod extractor;
pub mod truncate;

pub use budget::{check_digest_size, estimate_tokens, BudgetOverflow, ContextBudget, SizeReport};
pub use extractor::{CondensedContext, ContextExtractor, DigestConfig};
pub use truncate::{truncate_chars, TRUNCATION_MARKER};
