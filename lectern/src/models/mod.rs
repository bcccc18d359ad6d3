mod record;
mod trigger;

pub use record::*;
pub use trigger::*;
