mod api;
mod core;

pub use crate::client::{
    api::ClientApi,
    core::{ClientRegistry, Outbound},
};
