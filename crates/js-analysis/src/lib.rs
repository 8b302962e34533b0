pub mod dynamic;
pub mod static_analysis;
pub mod types;
mod sandbox_test;

pub use dynamic::{is_file_call, is_network_call, run_sandbox};
pub use static_analysis::{decode_layers, extract_js_signals, extract_js_signals_with_ast, DecodedLayers};
pub use types::{DynamicOptions, DynamicOutcome, DynamicSignals};
