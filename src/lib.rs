pub mod mission;
pub mod decision;
pub mod preprocessing;
pub mod engine;
pub mod invoker;
pub mod panel;
pub mod config;
pub mod error;
pub mod events;
pub mod interface;
pub mod junk_drawer;
pub mod state;

#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "desktop")]
pub mod commands;
