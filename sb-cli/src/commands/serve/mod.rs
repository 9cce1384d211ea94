pub mod args;
pub mod handler;

pub use args::ServeArgs;
pub use handler::handle_serve;
