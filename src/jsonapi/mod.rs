pub mod document;
pub mod helper;

pub use document::*;
pub use helper::*;
