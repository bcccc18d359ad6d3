pub mod handlers;
pub mod openapi;
pub mod response;
pub mod router;
