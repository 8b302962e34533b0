pub mod decode;
pub mod content;
pub mod graph;
pub mod lexer;
pub mod objstm;
pub mod object;
pub mod parser;
pub mod span;
pub mod xref;

pub use crate::graph::{parse_pdf, ObjectGraph, ParseOptions};
