pub mod constants;
pub mod error;
pub mod parameters;
pub mod waves;

pub use constants::*;
pub use error::*;
pub use parameters::*;
pub use waves::*;
