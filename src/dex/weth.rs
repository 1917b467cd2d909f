//! Wrapped native token. Used both as a routable exchange (native <-> wrapped
//! at 1:1) and as the source of the wrap/unwrap steps the assembler inserts
//! around legs whose exchanges cannot take the native token directly.

use super::{ensure_side, parse_data, DexAdapter};
use crate::abi::AbiCache;
use crate::config::NetworkConfig;
use crate::errors::AdapterError;
use crate::execution::positions::{
    CallLayout, FieldLocation, PatchField, WRAP_UNWRAP_FROM_AMOUNT_POS,
};
use crate::types::{
    AdapterExchangeParam, DexExchangeParam, SimpleExchangeParam, SwapRequest, SwapSide,
};
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use std::sync::Arc;

const EXCHANGE: &str = "weth";
const DEPOSIT: &str = "function deposit() payable";
const WITHDRAW: &str = "function withdraw(uint256 wad)";

/// Hop data carries nothing; unknown keys are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WethData {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conversion {
    Wrap,
    Unwrap,
}

#[derive(Debug, Clone)]
pub struct Weth {
    abi: Arc<AbiCache>,
    native_token: Address,
    wrapped_native: Address,
}

impl Weth {
    pub fn new(config: &NetworkConfig, abi: Arc<AbiCache>) -> Self {
        Self {
            abi,
            native_token: config.native_token_address,
            wrapped_native: config.wrapped_native_token_address,
        }
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    fn conversion(&self, request: &SwapRequest) -> Result<Conversion, AdapterError> {
        match (request.src_token, request.dest_token) {
            (src, dest) if src == self.native_token && dest == self.wrapped_native => Ok(Conversion::Wrap),
            (src, dest) if src == self.wrapped_native && dest == self.native_token => Ok(Conversion::Unwrap),
            _ => Err(AdapterError::InvalidData {
                exchange: EXCHANGE.to_string(),
                reason: "pair must be the native token and its wrapped form".to_string(),
            }),
        }
    }

    /// 1:1 conversion, so the fixed side's amount is the amount moved.
    fn amount(request: &SwapRequest) -> U256 {
        match request.side {
            SwapSide::Sell => request.src_amount,
            SwapSide::Buy => request.dest_amount,
        }
    }

    fn build(&self, conversion: Conversion, amount: U256) -> Result<DexExchangeParam, AdapterError> {
        let (exchange_data, layout, sends_native_value) = match conversion {
            // deposit() carries the amount as call value, nothing to patch
            Conversion::Wrap => (
                self.abi.encode_call(DEPOSIT, &[])?,
                CallLayout::new(self.abi.function(DEPOSIT)?),
                true,
            ),
            Conversion::Unwrap => (
                self.abi.encode_call(WITHDRAW, &[Token::Uint(amount)])?,
                CallLayout::new(self.abi.function(WITHDRAW)?)
                    .with(PatchField::FromAmount, FieldLocation::Literal(WRAP_UNWRAP_FROM_AMOUNT_POS)),
                false,
            ),
        };

        Ok(DexExchangeParam {
            needs_wrap_native: false,
            has_recipient_param: false,
            has_dest_token_param: false,
            sends_native_value,
            exchange_data,
            target_exchange: self.wrapped_native,
            special_exchange: None,
            layout,
        })
    }

    /// Step that turns `amount` of native token into the wrapped token.
    pub fn wrap_param(&self, amount: U256) -> Result<DexExchangeParam, AdapterError> {
        self.build(Conversion::Wrap, amount)
    }

    /// Step that turns `amount` of the wrapped token back into native token.
    pub fn unwrap_param(&self, amount: U256) -> Result<DexExchangeParam, AdapterError> {
        self.build(Conversion::Unwrap, amount)
    }

    fn calldata(&self, conversion: Conversion, amount: U256) -> Result<Bytes, AdapterError> {
        match conversion {
            Conversion::Wrap => self.abi.encode_call(DEPOSIT, &[]),
            Conversion::Unwrap => self.abi.encode_call(WITHDRAW, &[Token::Uint(amount)]),
        }
    }
}

impl DexAdapter for Weth {
    fn exchange_key(&self) -> &'static str {
        EXCHANGE
    }

    fn supported_sides(&self) -> &'static [SwapSide] {
        &[SwapSide::Sell, SwapSide::Buy]
    }

    fn adapter_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<AdapterExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let _: WethData = parse_data(EXCHANGE, data)?;
        self.conversion(request)?;

        Ok(AdapterExchangeParam {
            target_exchange: self.wrapped_native,
            payload: Bytes::default(),
            network_fee: U256::zero(),
        })
    }

    fn simple_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<SimpleExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let _: WethData = parse_data(EXCHANGE, data)?;
        let conversion = self.conversion(request)?;
        let amount = Self::amount(request);

        Ok(SimpleExchangeParam {
            approve_target: self.wrapped_native,
            calldata: self.calldata(conversion, amount)?,
            target_exchange: self.wrapped_native,
            value: match conversion {
                Conversion::Wrap => amount,
                Conversion::Unwrap => U256::zero(),
            },
            network_fee: U256::zero(),
        })
    }

    fn dex_param(
        &self,
        request: &SwapRequest,
        _recipient: Address,
        data: &serde_json::Value,
    ) -> Result<DexExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let _: WethData = parse_data(EXCHANGE, data)?;
        let conversion = self.conversion(request)?;
        self.build(conversion, Self::amount(request))
    }
}
