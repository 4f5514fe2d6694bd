//! Output formatting for CLI.

mod json;
mod text;

pub use json::{
    FailureOutput, GenerateOutput, JsonFormatter, PoolOutput, StreamOutput, ValidationOutput,
};
pub use text::TextFormatter;
#[cfg(test)]
mod tests;
