pub mod capabilities;
pub mod client;
pub mod exception;
pub mod feature_type;
pub mod gml;
pub mod schema;
pub mod transaction;

pub use capabilities::*;
pub use client::*;
pub use exception::*;
pub use feature_type::*;
pub use gml::*;
pub use schema::*;
pub use transaction::*;
