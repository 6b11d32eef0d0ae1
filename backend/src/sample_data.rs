//! # Sample Data Synthesizer Adapter
//!
//! Boundary to an external service that invents sample data for a list of
//! variable paths. The service returns free text that is expected to be a
//! single JSON object, possibly wrapped in a Markdown code fence. This module
//! strips the fence and accepts the result only if it parses as a JSON
//! object; malformed output is reported, never repaired or guessed.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[async_trait]
pub trait SampleDataGenerator: Send + Sync {
    /// Returns raw generated text for `variable_paths`.
    async fn generate(&self, variable_paths: &[String]) -> Result<String, GenerationError>;
}

/// Asks `generator` for sample data and validates its output.
pub async fn synthesize(
    generator: &dyn SampleDataGenerator,
    variable_paths: &[String],
) -> Result<Value, GenerationError> {
    let text = generator.generate(variable_paths).await?;
    let data = parse_generated(&text)?;
    log::debug!(
        "sample data generated for {} variable paths",
        variable_paths.len()
    );
    Ok(data)
}

/// Strips an optional code fence and parses strict JSON, requiring an object.
pub fn parse_generated(text: &str) -> Result<Value, GenerationError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(GenerationError::EmptyOutput);
    }
    match serde_json::from_str::<Value>(body)? {
        value @ Value::Object(_) => Ok(value),
        _ => Err(GenerationError::NotAnObject),
    }
}

/// Removes a surrounding ```` ``` ```` / ```` ```json ```` fence, if present.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Runs an external command as the generation service.
///
/// The JSON array of variable paths is written to the child's stdin and its
/// stdout is taken as the generated text.
pub struct ProcessGenerator {
    program: String,
    args: Vec<String>,
}

impl ProcessGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl SampleDataGenerator for ProcessGenerator {
    async fn generate(&self, variable_paths: &[String]) -> Result<String, GenerationError> {
        let unavailable = |e: std::io::Error| GenerationError::Unavailable(e.to_string());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(unavailable)?;

        let input = serde_json::to_vec(variable_paths)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await.map_err(unavailable)?;
        }

        let output = child.wait_with_output().await.map_err(unavailable)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerationError::Unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| GenerationError::Unavailable(format!("non UTF-8 output: {e}")))
    }
}
