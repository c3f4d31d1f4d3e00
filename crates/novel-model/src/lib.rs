pub mod book;
pub mod chapter;
pub mod error;

pub use book::*;
pub use chapter::*;
pub use error::*;
