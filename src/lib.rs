pub mod config;
pub mod connection;
pub mod exception;
pub mod param;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;
pub mod util;

pub use config::Config;
pub use exception::Exception;
pub use param::{HttpRequestMethod, HttpStatus, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use server::{serve, ServerError};
