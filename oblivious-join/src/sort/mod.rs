//! External sort (§4.8): used when a table exceeds the dispatcher's batch
//! capacity.

pub mod external;

pub use external::sort_large;
