pub mod reporter;

pub use reporter::{OutcomeReporter, UserFacingError};
