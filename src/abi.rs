//! Parsed-signature cache shared by the adapters of one registry.

use dashmap::DashMap;
use ethers::abi::{Function, HumanReadableParser, Token};
use ethers::types::Bytes;
use std::sync::Arc;
use tracing::trace;

use crate::errors::AdapterError;

/// Memoizes human-readable function signatures parsed into `ethers` ABI functions.
#[derive(Debug, Default)]
pub struct AbiCache {
    functions: DashMap<String, Arc<Function>>,
}

impl AbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse (or fetch) a signature such as
    /// `"function withdraw(uint256 wad)"`.
    pub fn function(&self, signature: &str) -> Result<Arc<Function>, AdapterError> {
        if let Some(function) = self.functions.get(signature) {
            return Ok(function.value().clone());
        }

        let function = HumanReadableParser::parse_function(signature)
            .map_err(|e| AdapterError::Abi(format!("failed to parse `{}`: {}", signature, e)))?;
        trace!(name = %function.name, "parsed ABI signature");

        let function = Arc::new(function);
        self.functions.insert(signature.to_string(), function.clone());
        Ok(function)
    }

    /// Encode a call including its 4-byte selector.
    pub fn encode_call(&self, signature: &str, tokens: &[Token]) -> Result<Bytes, AdapterError> {
        let function = self.function(signature)?;
        function
            .encode_input(tokens)
            .map(Bytes::from)
            .map_err(|e| AdapterError::Abi(format!("failed to encode {}: {}", function.name, e)))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
