mod router;
mod server;

pub use router::{RuntimeState, app_router};
pub use server::serve_http;
