mod api;
mod core;

pub use crate::emulator::{
    api::EmulatorApi,
    core::{emulator_start, emulator_status, emulator_stop, EmulatorHandle, EmulatorStatus},
};
