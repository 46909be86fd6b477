//! OfferLab Quality: stage output validation
//!
//! Every stage output is checked before the pipeline accepts it. Contracts
//! are registered per stage; stages without one get a structural check.
//!
//! # Example
//!
//! ```ignore
//! use offerlab_quality::ResponseValidator;
//!
//! let validator = ResponseValidator::standard();
//! let result = validator.validate(StageId(10), &output, raw.len());
//! if !result.is_valid() {
//!     println!("{}", result.summary());
//! }
//! ```

pub mod checks;
pub mod contracts;
pub mod profile;
pub mod result;
pub mod validator;

pub use checks::{has_placeholder, is_empty, validate_string_array, Cardinality, Findings};
pub use contracts::{builtin_contracts, StageContract};
pub use profile::PenaltyProfile;
pub use result::{ValidationMetrics, ValidationResult};
pub use validator::ResponseValidator;
