#![cfg_attr(feature = "strict", deny(warnings))]

pub mod configuration_utils;
pub use configuration_utils::ParsableConfigValue;

mod guards;
pub use guards::EnvVarGuard;

pub mod pipe;
pub use pipe::{pipe, ChannelStream, ChannelWriter};
