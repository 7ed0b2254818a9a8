//! Remote stat schema handling: the binary tree codec, achievement extraction
//! and display-name selection.
pub mod kv;
pub mod locale;
pub mod parser;

pub use kv::{decode, encode, Node, Value};
pub use locale::{apply_display_names, language_key, resolve_display_name};
pub use parser::{parse_achievements, parse_tree};
