// src/config.rs

//! # Network Configuration
//!
//! Per-network contract addresses consumed by the compiler. The value is loaded
//! once (from JSON or built in code), validated, and then passed by reference
//! into every compile call. Nothing here is global or mutable after load.

use crate::execution::encoder::ExecutorVersion;
use ethers::types::Address;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path, str::FromStr};
use tracing::debug;

/// Placeholder address used by routes to denote the chain's native token.
pub const NATIVE_TOKEN_PLACEHOLDER: &str = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE";

fn default_native_token() -> Address {
    Address::from_str(NATIVE_TOKEN_PLACEHOLDER).unwrap_or_default()
}

//================================================================================================//
//                                        Network Config                                          //
//================================================================================================//

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network: u64,
    pub network_name: String,
    #[serde(default = "default_native_token")]
    pub native_token_address: Address,
    pub wrapped_native_token_address: Address,
    pub augustus_address: Address,
    /// Contract users approve; it pulls the source token into the executor.
    pub token_transfer_proxy_address: Address,
    #[serde(default)]
    pub executors_addresses: HashMap<ExecutorVersion, Address>,
    /// On-chain adapter contracts by name (`Adapter01`, `BuyAdapter`, ...).
    #[serde(default)]
    pub adapter_addresses: HashMap<String, Address>,
    /// Default router/pool address per exchange key, used when hop data omits one.
    #[serde(default)]
    pub exchange_addresses: HashMap<String, Address>,
}

impl NetworkConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read network config file: {}", path.display()))?;
        let config = Self::from_json_str(&content)
            .with_context(|| format!("Failed to load network config: {}", path.display()))?;
        debug!(network = config.network, name = %config.network_name, "loaded network config");
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(content).context("Failed to parse network config from JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that would let the compiler emit calls to the zero address.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("wrappedNativeTokenAddress", self.wrapped_native_token_address),
            ("augustusAddress", self.augustus_address),
            ("tokenTransferProxyAddress", self.token_transfer_proxy_address),
        ];
        for (name, address) in required {
            if address.is_zero() {
                return Err(eyre::eyre!("{} must not be the zero address", name));
            }
        }
        for (version, address) in &self.executors_addresses {
            if address.is_zero() {
                return Err(eyre::eyre!("executor {} must not be the zero address", version));
            }
        }
        if self.native_token_address == self.wrapped_native_token_address {
            return Err(eyre::eyre!("native token placeholder and wrapped native token must differ"));
        }
        Ok(())
    }

    pub fn executor_address(&self, version: ExecutorVersion) -> Option<Address> {
        self.executors_addresses.get(&version).copied()
    }

    /// Default address for an exchange key, case-insensitive.
    pub fn exchange_address(&self, exchange: &str) -> Option<Address> {
        self.exchange_addresses
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(exchange))
            .map(|(_, address)| *address)
    }

    pub fn is_native(&self, token: Address) -> bool {
        token == self.native_token_address
    }
}
