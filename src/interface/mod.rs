//! Interface layer - HTTP API for starting, inspecting and cancelling
//! workflows, plus Prometheus metrics

pub mod api;
