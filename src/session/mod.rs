mod core;
mod route;

pub use crate::session::{core::error_frame, route::pad_socket};
