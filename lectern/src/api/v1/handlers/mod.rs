pub mod captures;
pub(crate) mod health;
pub mod results;

pub use health::health_check;
