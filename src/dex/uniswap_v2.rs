//! Uniswap V2 style router adapter (also covers forks sharing the router ABI).

use super::{ensure_side, missing_address, parse_data, DexAdapter};
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

const EXCHANGE: &str = "uniswapv2";
const SWAP_EXACT_IN: &str = "function swapExactTokensForTokens(uint256 amountIn, uint256 amountOutMin, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts)";
const SWAP_EXACT_OUT: &str = "function swapTokensForExactTokens(uint256 amountOut, uint256 amountInMax, address[] calldata path, address to, uint256 deadline) external returns (uint256[] memory amounts)";

// argument indices shared by both router functions
const ARG_FIXED_AMOUNT: usize = 0;
const ARG_BOUND_AMOUNT: usize = 1;
const ARG_PATH: usize = 2;
const ARG_TO: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniswapV2Data {
    #[serde(default)]
    pub router: Option<Address>,
    /// Token path; defaults to `[src, dest]`.
    #[serde(default)]
    pub path: Vec<Address>,
}

#[derive(Debug, Clone)]
pub struct UniswapV2 {
    abi: Arc<AbiCache>,
    router: Option<Address>,
    native_token: Address,
    wrapped_native: Address,
    augustus: Address,
}

impl UniswapV2 {
    pub fn new(config: &NetworkConfig, abi: Arc<AbiCache>) -> Self {
        Self {
            abi,
            router: config.exchange_address(EXCHANGE),
            native_token: config.native_token_address,
            wrapped_native: config.wrapped_native_token_address,
            augustus: config.augustus_address,
        }
    }

    fn router(&self, data: &UniswapV2Data) -> Result<Address, AdapterError> {
        data.router.or(self.router).ok_or_else(|| missing_address(EXCHANGE, "router"))
    }

    /// Router path with the native placeholder replaced by the wrapped token.
    fn path(&self, request: &SwapRequest, data: &UniswapV2Data) -> Result<Vec<Address>, AdapterError> {
        let path = if data.path.is_empty() {
            vec![request.src_token, request.dest_token]
        } else {
            data.path.clone()
        };
        if path.len() < 2 {
            return Err(AdapterError::InvalidData {
                exchange: EXCHANGE.to_string(),
                reason: "router path needs at least two tokens".to_string(),
            });
        }
        Ok(path
            .into_iter()
            .map(|token| if token == self.native_token { self.wrapped_native } else { token })
            .collect())
    }

    fn signature(side: SwapSide) -> &'static str {
        match side {
            SwapSide::Sell => SWAP_EXACT_IN,
            SwapSide::Buy => SWAP_EXACT_OUT,
        }
    }

    fn swap_calldata(&self, request: &SwapRequest, path: &[Address], to: Address) -> Result<Bytes, AdapterError> {
        let (fixed, bound) = match request.side {
            SwapSide::Sell => (request.src_amount, request.dest_amount),
            SwapSide::Buy => (request.dest_amount, request.src_amount),
        };
        self.abi.encode_call(
            Self::signature(request.side),
            &[
                Token::Uint(fixed),
                Token::Uint(bound),
                Token::Array(path.iter().copied().map(Token::Address).collect()),
                Token::Address(to),
                Token::Uint(U256::MAX),
            ],
        )
    }
}

impl DexAdapter for UniswapV2 {
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
        let data: UniswapV2Data = parse_data(EXCHANGE, data)?;
        let router = self.router(&data)?;
        let path = self.path(request, &data)?;

        let payload = ethers::abi::encode(&[Token::Tuple(vec![
            Token::Address(router),
            Token::Array(path.into_iter().map(Token::Address).collect()),
        ])]);

        Ok(AdapterExchangeParam {
            target_exchange: router,
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
        let data: UniswapV2Data = parse_data(EXCHANGE, data)?;
        let router = self.router(&data)?;
        let path = self.path(request, &data)?;

        Ok(SimpleExchangeParam {
            approve_target: router,
            calldata: self.swap_calldata(request, &path, self.augustus)?,
            target_exchange: router,
            value: U256::zero(),
            network_fee: U256::zero(),
        })
    }

    fn dex_param(
        &self,
        request: &SwapRequest,
        recipient: Address,
        data: &serde_json::Value,
    ) -> Result<DexExchangeParam, AdapterError> {
        ensure_side(EXCHANGE, self.supported_sides(), request.side)?;
        let data: UniswapV2Data = parse_data(EXCHANGE, data)?;
        let path = self.path(request, &data)?;
        let last = path.len() - 1;

        let (from_arg, to_arg) = match request.side {
            SwapSide::Sell => (ARG_FIXED_AMOUNT, ARG_BOUND_AMOUNT),
            SwapSide::Buy => (ARG_BOUND_AMOUNT, ARG_FIXED_AMOUNT),
        };
        let layout = CallLayout::new(self.abi.function(Self::signature(request.side))?)
            .with_slot(PatchField::FromAmount, FieldPath::arg(from_arg))
            .with_slot(PatchField::ToAmount, FieldPath::arg(to_arg))
            .with_slot(PatchField::SrcToken, FieldPath::arg(ARG_PATH).then(0))
            .with_slot(PatchField::DestToken, FieldPath::arg(ARG_PATH).then(last))
            .with_slot(PatchField::Recipient, FieldPath::arg(ARG_TO));

        Ok(DexExchangeParam {
            needs_wrap_native: true,
            has_recipient_param: true,
            has_dest_token_param: true,
            sends_native_value: false,
            exchange_data: self.swap_calldata(request, &path, recipient)?,
            target_exchange: self.router(&data)?,
            special_exchange: None,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::test_support::{mainnet, sell};
    use crate::execution::positions::{resolve_field, resolve_positions};
    use serde_json::json;

    fn word(calldata: &[u8], at: u16) -> U256 {
        U256::from_big_endian(&calldata[at as usize..at as usize + 32])
    }

    #[test]
    fn test_sell_positions() {
        let config = mainnet();
        let uni = UniswapV2::new(&config, Arc::new(AbiCache::new()));
        let (src, mid, dest) = (Address::random(), Address::random(), Address::random());
        let recipient = Address::random();

        let param = uni
            .dex_param(&sell(src, dest, 500, 450), recipient, &json!({ "path": [src, mid, dest] }))
            .unwrap();
        let calldata = &param.exchange_data;
        let positions = resolve_positions(&param.layout, calldata).unwrap();

        assert_eq!(positions.from_amount, Some(4));
        assert_eq!(word(calldata, 4), U256::from(500u64));
        assert_eq!(word(calldata, positions.to_amount.unwrap()), U256::from(450u64));

        let dest_pos = resolve_field(&param.layout, calldata, PatchField::DestToken).unwrap() as usize;
        assert_eq!(Address::from_slice(&calldata[dest_pos + 12..dest_pos + 32]), dest);
        let to_pos = resolve_field(&param.layout, calldata, PatchField::Recipient).unwrap() as usize;
        assert_eq!(Address::from_slice(&calldata[to_pos + 12..to_pos + 32]), recipient);
    }

    #[test]
    fn test_buy_swaps_fixed_and_bound_slots() {
        let uni = UniswapV2::new(&mainnet(), Arc::new(AbiCache::new()));
        let mut request = sell(Address::random(), Address::random(), 700, 300);
        request.side = SwapSide::Buy;

        let param = uni.dex_param(&request, Address::random(), &json!({})).unwrap();
        let positions = resolve_positions(&param.layout, &param.exchange_data).unwrap();

        // amountInMax is the patched input bound, amountOut the fixed output
        assert_eq!(positions.from_amount, Some(36));
        assert_eq!(word(&param.exchange_data, 36), U256::from(700u64));
        assert_eq!(positions.to_amount, Some(4));
        assert_eq!(word(&param.exchange_data, 4), U256::from(300u64));
    }

    #[test]
    fn test_native_placeholder_is_wrapped_in_path() {
        let config = mainnet();
        let uni = UniswapV2::new(&config, Arc::new(AbiCache::new()));
        let request = sell(config.native_token_address, Address::random(), 1, 1);

        let param = uni.dex_param(&request, Address::random(), &json!({})).unwrap();
        let pos = resolve_field(&param.layout, &param.exchange_data, PatchField::SrcToken).unwrap() as usize;
        assert_eq!(
            Address::from_slice(&param.exchange_data[pos + 12..pos + 32]),
            config.wrapped_native_token_address
        );
    }

    #[test]
    fn test_missing_router_is_reported() {
        let mut config = mainnet();
        config.exchange_addresses.clear();
        let uni = UniswapV2::new(&config, Arc::new(AbiCache::new()));
        let request = sell(Address::random(), Address::random(), 1, 1);

        let err = uni.simple_param(&request, &json!({})).unwrap_err();
        assert!(matches!(err, AdapterError::MissingAddress { .. }));

        let routed = uni
            .simple_param(&request, &json!({ "router": Address::repeat_byte(0x42) }))
            .unwrap();
        assert_eq!(routed.target_exchange, Address::repeat_byte(0x42));
    }
}
