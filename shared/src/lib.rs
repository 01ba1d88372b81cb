//! Bakery production engine
//!
//! Pure calculations shared by the backend, the WASM previews and the tests:
//! ratio trees, flour-weight resolution, recursive consumption, dough
//! temperature control and weighted-average stock valuation.

pub mod consumption;
pub mod error;
pub mod ledger;
pub mod models;
pub mod resolver;
pub mod thermal;
pub mod types;
pub mod validation;

pub use consumption::*;
pub use error::*;
pub use ledger::*;
pub use models::*;
pub use resolver::*;
pub use thermal::*;
pub use types::*;
pub use validation::*;
