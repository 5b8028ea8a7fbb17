pub mod error_classifier;
pub mod gate;

pub use error_classifier::*;
pub use gate::*;
