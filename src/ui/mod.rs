pub mod app;
pub mod components;
pub mod routes;
pub mod state;

pub use app::ChatApp;
