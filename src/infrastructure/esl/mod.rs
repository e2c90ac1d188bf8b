//! Switch event socket transport

pub mod client;
pub mod frame;

pub use client::EslSwitchClient;
