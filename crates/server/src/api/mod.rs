pub mod campaign;
pub mod handlers;
pub mod leads;
pub mod middleware;
pub mod results;
pub mod routes;
pub mod telephony;

pub use routes::create_router;
