//! Built-in adapters for running skills without credentials.

use async_trait::async_trait;
use skein_core::{LlmAdapter, Result};

/// An adapter that returns its prompt verbatim.
///
/// Useful for dry-running skills: every PROMPT step succeeds with the
/// rendered prompt as its output, so variable flow and output contracts
/// can be exercised offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoAdapter;

#[async_trait]
impl LlmAdapter for EchoAdapter {
    fn name(&self) -> &str {
        "echo"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_the_prompt() {
        let adapter = EchoAdapter;
        assert!(adapter.is_available());
        assert_eq!(adapter.complete("say hi").await.unwrap(), "say hi");
    }
}
