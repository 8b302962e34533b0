pub mod detect;
pub mod chain;
pub mod chain_render;
pub mod chain_score;
pub mod chain_synth;
pub mod diff;
pub mod graph_export;
pub mod config;
pub mod taint;
pub mod model;
pub mod report;
pub mod runner;
pub mod scan;

pub use detect::{Cost, Detector, Needs};
