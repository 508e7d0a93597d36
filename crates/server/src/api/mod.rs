pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod transformations;

pub use routes::create_router;
