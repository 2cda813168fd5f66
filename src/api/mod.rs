// HTTP surface: webhook intake and health

mod webhook;

pub use webhook::{create_router, AppState, StatusResponse};
