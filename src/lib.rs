//! Weather-driven advisories for olive groves: climate context, irrigation
//! water balance, pest risk and spray/irrigation coordination.

pub mod cli;
pub mod config;
pub mod datasources;
pub mod db;
pub mod error;
pub mod logic;
pub mod models;
pub mod ports;
