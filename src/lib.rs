pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod fixtures;
pub mod network;
pub mod replay;
pub mod simulated_client;
pub mod storage;
pub mod wire;
