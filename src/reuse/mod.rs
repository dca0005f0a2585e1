//! Validation of cached answers against a new query.
//!
//! - [`model`]: re-evaluates the query under nearby cached models and trims
//!   the accepted model to the query's variable count.
//! - [`core`]: accepts a nearby unsat core when every clause occurs in the
//!   query's canonical text.

pub mod core;
pub mod model;

pub use self::core::find_core;
pub use self::model::{find_model, trim_model};
