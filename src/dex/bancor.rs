//! Bancor network adapter. Sell-only: `convert2` has no fixed-output mode.

use super::{deserialize_amount, ensure_side, missing_address, parse_data, DexAdapter};
use crate::abi::AbiCache;
use crate::config::NetworkConfig;
use crate::errors::AdapterError;
use crate::execution::positions::{CallLayout, FieldPath, PatchField};
use crate::types::{
    AdapterExchangeParam, DexExchangeParam, SimpleExchangeParam, SwapRequest, SwapSide,
};
use ethers::abi::Token;
use ethers::types::{Address, Bytes, U256};
use serde::Deserialize;
use std::sync::Arc;

const EXCHANGE: &str = "bancor";
const CONVERT2: &str = "function convert2(address[] path, uint256 amount, uint256 minReturn, address affiliateAccount, uint256 affiliateFee) payable returns (uint256)";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BancorData {
    pub path: Vec<Address>,
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub min_dest_token: Option<U256>,
    #[serde(default)]
    pub bancor_network: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct Bancor {
    abi: Arc<AbiCache>,
    network: Option<Address>,
    registry: Option<Address>,
    native_token: Address,
}

impl Bancor {
    pub fn new(config: &NetworkConfig, abi: Arc<AbiCache>) -> Self {
        Self {
            abi,
            network: config.exchange_address(EXCHANGE),
            registry: config.exchange_address("bancorregistry"),
            native_token: config.native_token_address,
        }
    }

    fn network_address(&self, data: &BancorData) -> Result<Address, AdapterError> {
        data.bancor_network
            .or(self.network)
            .ok_or_else(|| missing_address(EXCHANGE, "network"))
    }

    fn convert2_calldata(&self, request: &SwapRequest, data: &BancorData) -> Result<Bytes, AdapterError> {
        if data.path.len() < 2 {
            return Err(AdapterError::InvalidData {
                exchange: EXCHANGE.to_string(),
                reason: "conversion path needs at least two entries".to_string(),
            });
        }
        let min_return = data.min_dest_token.unwrap_or_else(U256::one);
        self.abi.encode_call(
            CONVERT2,
            &[
                Token::Array(data.path.iter().copied().map(Token::Address).collect()),
                Token::Uint(request.src_amount),
                Token::Uint(min_return),
                Token::Address(Address::zero()),
                Token::Uint(U256::zero()),
            ],
        )
    }
}

impl DexAdapter for Bancor {
    fn exchange_key(&self) -> &'static str {
        EXCHANGE
    }

    fn supported_sides(&self) -> &'static [SwapSide] {
        &[SwapSide::Sell]
    }

    fn adapter_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<AdapterExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let data: BancorData = parse_data(EXCHANGE, data)?;

        let payload = ethers::abi::encode(&[Token::Tuple(vec![Token::Array(
            data.path.iter().copied().map(Token::Address).collect(),
        )])]);

        Ok(AdapterExchangeParam {
            target_exchange: self.registry.ok_or_else(|| missing_address(EXCHANGE, "registry"))?,
            payload: payload.into(),
            network_fee: U256::zero(),
        })
    }

    fn simple_param(
        &self,
        request: &SwapRequest,
        data: &serde_json::Value,
    ) -> Result<SimpleExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let data: BancorData = parse_data(EXCHANGE, data)?;
        let network = self.network_address(&data)?;

        // convert2 accepts native value directly, no WETH conversion
        let value = if request.src_token == self.native_token {
            request.src_amount
        } else {
            U256::zero()
        };

        Ok(SimpleExchangeParam {
            approve_target: network,
            calldata: self.convert2_calldata(request, &data)?,
            target_exchange: network,
            value,
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
        let data: BancorData = parse_data(EXCHANGE, data)?;

        let layout = CallLayout::new(self.abi.function(CONVERT2)?)
            .with_slot(PatchField::FromAmount, FieldPath::arg(1))
            .with_slot(PatchField::ToAmount, FieldPath::arg(2))
            .with_slot(PatchField::SrcToken, FieldPath::arg(0).then(0));

        Ok(DexExchangeParam {
            needs_wrap_native: true,
            has_recipient_param: false,
            has_dest_token_param: false,
            sends_native_value: false,
            exchange_data: self.convert2_calldata(request, &data)?,
            target_exchange: self.network_address(&data)?,
            special_exchange: None,
            layout,
        })
    }
}
