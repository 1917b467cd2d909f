//! # Exchange Adapter Interface
//!
//! Defines the `DexAdapter` capability every exchange integration implements,
//! the `ExchangeAdapter` tagged union used for dispatch, and the
//! `AdapterRegistry` that maps exchange keys to implementations. The assembler
//! only ever sees the structured parameters an adapter returns and never
//! branches on which exchange produced them.

pub mod bancor;
pub mod maker_psm;
pub mod uniswap_v2;
pub mod weth;

pub use bancor::Bancor;
pub use maker_psm::MakerPsm;
pub use uniswap_v2::UniswapV2;
pub use weth::Weth;

use crate::abi::AbiCache;
use crate::config::NetworkConfig;
use crate::errors::AdapterError;
use crate::types::{
    AdapterExchangeParam, DexExchangeParam, SimpleExchangeParam, SwapRequest, SwapSide,
};
use ethers::types::{Address, U256};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Translates a generic swap request into one exchange's call parameters.
///
/// Implementations are pure: no network access and no interior state beyond the
/// addresses captured at construction. Every operation fails with
/// `AdapterError::UnsupportedSide` for a side the exchange cannot execute.
pub trait DexAdapter: Send + Sync + Debug {
    /// Registry key, lower-case.
    fn exchange_key(&self) -> &'static str;

    fn supported_sides(&self) -> &'static [SwapSide];

    fn supports_side(&self, side: SwapSide) -> bool {
        self.supported_sides().contains(&side)
    }

    /// Payload for the on-chain adapter contract indirection.
    fn adapter_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<AdapterExchangeParam, AdapterError>;

    /// Self-contained call for direct execution.
    fn simple_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<SimpleExchangeParam, AdapterError>;

    /// Structured call parameters consumed by the position resolver and encoder.
    fn dex_param(
        &self,
        request: &SwapRequest,
        recipient: Address,
        data: &serde_json::Value,
    ) -> Result<DexExchangeParam, AdapterError>;
}

/// Tagged-variant dispatch over the built-in adapters.
#[derive(Debug)]
pub enum ExchangeAdapter {
    Bancor(Bancor),
    UniswapV2(UniswapV2),
    MakerPsm(MakerPsm),
    Weth(Weth),
}

macro_rules! dispatch {
    ($self:ident, $adapter:ident => $body:expr) => {
        match $self {
            ExchangeAdapter::Bancor($adapter) => $body,
            ExchangeAdapter::UniswapV2($adapter) => $body,
            ExchangeAdapter::MakerPsm($adapter) => $body,
            ExchangeAdapter::Weth($adapter) => $body,
        }
    };
}

impl DexAdapter for ExchangeAdapter {
    fn exchange_key(&self) -> &'static str {
        dispatch!(self, a => a.exchange_key())
    }

    fn supported_sides(&self) -> &'static [SwapSide] {
        dispatch!(self, a => a.supported_sides())
    }

    fn adapter_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<AdapterExchangeParam, AdapterError> {
        dispatch!(self, a => a.adapter_param(request, data))
    }

    fn simple_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<SimpleExchangeParam, AdapterError> {
        dispatch!(self, a => a.simple_param(request, data))
    }

    fn dex_param(
        &self,
        request: &SwapRequest,
        recipient: Address,
        data: &serde_json::Value,
    ) -> Result<DexExchangeParam, AdapterError> {
        dispatch!(self, a => a.dex_param(request, recipient, data))
    }
}

/// Immutable map from exchange key to adapter, built once per network.
#[derive(Debug)]
pub struct AdapterRegistry {
    adapters: HashMap<String, ExchangeAdapter>,
    weth: Weth,
}

impl AdapterRegistry {
    /// Registry with every built-in adapter, bound to the given network.
    pub fn new(config: &NetworkConfig) -> Self {
        let abi = Arc::new(AbiCache::new());
        let weth = Weth::new(config, abi.clone());
        let mut registry = Self {
            adapters: HashMap::new(),
            weth: weth.clone(),
        };
        registry.register(ExchangeAdapter::Bancor(Bancor::new(config, abi.clone())));
        registry.register(ExchangeAdapter::UniswapV2(UniswapV2::new(config, abi.clone())));
        registry.register(ExchangeAdapter::MakerPsm(MakerPsm::new(config, abi)));
        registry.register(ExchangeAdapter::Weth(weth));
        registry
    }

    pub fn register(&mut self, adapter: ExchangeAdapter) {
        let key = adapter.exchange_key().to_ascii_lowercase();
        debug!(exchange = %key, "registered exchange adapter");
        self.adapters.insert(key, adapter);
    }

    /// Case-insensitive lookup.
    pub fn get(&self, exchange: &str) -> Option<&ExchangeAdapter> {
        self.adapters.get(&exchange.to_ascii_lowercase())
    }

    /// Adapter used for wrap/unwrap pseudo-instructions.
    pub fn wrapper(&self) -> &Weth {
        &self.weth
    }

    pub fn exchange_keys(&self) -> impl Iterator<Item = &str> {
        self.adapters.keys().map(String::as_str)
    }
}

//================================================================================================//
//                                       Adapter Helpers                                          //
//================================================================================================//

pub(crate) fn ensure_side(
    exchange: &str,
    supported: &[SwapSide],
    side: SwapSide,
) -> Result<(), AdapterError> {
    if supported.contains(&side) {
        Ok(())
    } else {
        Err(AdapterError::UnsupportedSide {
            exchange: exchange.to_string(),
            side,
        })
    }
}

/// Interpret a hop's opaque data as the adapter's typed payload. Missing
/// (`null`) data reads as an empty object.
pub(crate) fn parse_data<T: DeserializeOwned>(
    exchange: &str,
    data: &serde_json::Value,
) -> Result<T, AdapterError> {
    let data = match data {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(data).map_err(|e| AdapterError::InvalidData {
        exchange: exchange.to_string(),
        reason: e.to_string(),
    })
}

/// Hop data carries amounts as decimal strings; hex (`0x..`) is accepted too.
pub(crate) fn deserialize_amount<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        let parsed = match s.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_dec_str(&s).ok(),
        };
        parsed.ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {}", s)))
    })
    .transpose()
}

pub(crate) fn missing_address(exchange: &str, what: &str) -> AdapterError {
    AdapterError::MissingAddress {
        exchange: exchange.to_string(),
        what: what.to_string(),
    }
}
