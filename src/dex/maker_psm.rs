//! Maker Peg Stability Module. Swaps a stablecoin gem against DAI at a fixed
//! rate minus a toll. Both PSM entry points take the amount in gem units, so
//! the patched slot is flagged as a special exchange and rescaled on-chain.

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

const EXCHANGE: &str = "makerpsm";
const SELL_GEM: &str = "function sellGem(address usr, uint256 gemAmt) external";
const BUY_GEM: &str = "function buyGem(address usr, uint256 gemAmt) external";

/// Executor-side handler id for gem-denominated amount slots.
pub const MAKER_PSM_SPECIAL_EXCHANGE: u16 = 1;

const DAI_DECIMALS: u8 = 18;

fn wad() -> U256 {
    U256::exp10(18)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakerPsmData {
    #[serde(default)]
    pub psm_address: Option<Address>,
    pub gem_join_address: Address,
    pub gem: Address,
    pub dai: Address,
    /// Fee as a WAD fraction charged on the active direction.
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub toll: Option<U256>,
    #[serde(default = "default_gem_decimals")]
    pub gem_decimals: u8,
}

fn default_gem_decimals() -> u8 {
    6
}

impl MakerPsmData {
    fn to18_conversion_factor(&self) -> Result<U256, AdapterError> {
        if self.gem_decimals > DAI_DECIMALS {
            return Err(AdapterError::InvalidData {
                exchange: EXCHANGE.to_string(),
                reason: format!("gem decimals {} exceed DAI decimals", self.gem_decimals),
            });
        }
        Ok(U256::exp10((DAI_DECIMALS - self.gem_decimals) as usize))
    }
}

fn invalid(reason: &str) -> AdapterError {
    AdapterError::InvalidData {
        exchange: EXCHANGE.to_string(),
        reason: reason.to_string(),
    }
}

fn wad_scaled(amount: U256) -> Result<U256, AdapterError> {
    amount
        .checked_mul(wad())
        .ok_or_else(|| invalid("amount overflows WAD scaling"))
}

/// Which PSM entry point a request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// gem in, DAI out
    SellGem,
    /// DAI in, gem out
    BuyGem,
}

#[derive(Debug, Clone)]
pub struct MakerPsm {
    abi: Arc<AbiCache>,
    psm: Option<Address>,
    augustus: Address,
}

impl MakerPsm {
    pub fn new(config: &NetworkConfig, abi: Arc<AbiCache>) -> Self {
        Self {
            abi,
            psm: config.exchange_address(EXCHANGE),
            augustus: config.augustus_address,
        }
    }

    fn psm_address(&self, data: &MakerPsmData) -> Result<Address, AdapterError> {
        data.psm_address.or(self.psm).ok_or_else(|| missing_address(EXCHANGE, "psm"))
    }

    fn direction(request: &SwapRequest, data: &MakerPsmData) -> Result<Direction, AdapterError> {
        if request.src_token == data.gem && request.dest_token == data.dai {
            Ok(Direction::SellGem)
        } else if request.src_token == data.dai && request.dest_token == data.gem {
            Ok(Direction::BuyGem)
        } else {
            Err(AdapterError::InvalidData {
                exchange: EXCHANGE.to_string(),
                reason: "pair must be the PSM gem and DAI".to_string(),
            })
        }
    }

    /// Gem amount passed to the PSM call.
    ///
    /// A gem-in sell and a gem-out buy already name the gem amount. The other
    /// two cases derive it from the DAI side after the toll:
    /// DAI in is `dai * WAD / (WAD + toll) / to18`, and exact DAI out needs
    /// `dai * WAD / ((WAD - toll) * to18)` gem in.
    fn gem_amount(
        request: &SwapRequest,
        data: &MakerPsmData,
        direction: Direction,
    ) -> Result<U256, AdapterError> {
        let toll = data.toll.unwrap_or_default();
        match (direction, request.side) {
            (Direction::SellGem, SwapSide::Sell) => Ok(request.src_amount),
            (Direction::BuyGem, SwapSide::Buy) => Ok(request.dest_amount),
            (Direction::SellGem, SwapSide::Buy) => {
                let scaled = wad_scaled(request.dest_amount)?;
                let net = wad()
                    .checked_sub(toll)
                    .filter(|net| !net.is_zero())
                    .ok_or_else(|| invalid("toll must be below one WAD"))?;
                let divisor = net
                    .checked_mul(data.to18_conversion_factor()?)
                    .ok_or_else(|| invalid("toll denominator overflows"))?;
                Ok(scaled / divisor)
            }
            (Direction::BuyGem, SwapSide::Sell) => {
                let scaled = wad_scaled(request.src_amount)?;
                let gross = wad()
                    .checked_add(toll)
                    .ok_or_else(|| invalid("toll denominator overflows"))?;
                Ok(scaled / gross / data.to18_conversion_factor()?)
            }
        }
    }

    fn signature(direction: Direction) -> &'static str {
        match direction {
            Direction::SellGem => SELL_GEM,
            Direction::BuyGem => BUY_GEM,
        }
    }

    fn call(
        &self,
        request: &SwapRequest,
        data: &MakerPsmData,
        usr: Address,
    ) -> Result<(Direction, Bytes), AdapterError> {
        let direction = Self::direction(request, data)?;
        let amount = Self::gem_amount(request, data, direction)?;
        let calldata = self.abi.encode_call(
            Self::signature(direction),
            &[Token::Address(usr), Token::Uint(amount)],
        )?;
        Ok((direction, calldata))
    }
}

impl DexAdapter for MakerPsm {
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
        let data: MakerPsmData = parse_data(EXCHANGE, data)?;
        Self::direction(request, &data)?;

        let payload = ethers::abi::encode(&[Token::Tuple(vec![
            Token::Address(data.gem_join_address),
            Token::Uint(data.toll.unwrap_or_default()),
            Token::Uint(data.to18_conversion_factor()?),
        ])]);

        Ok(AdapterExchangeParam {
            target_exchange: self.psm_address(&data)?,
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
        let data: MakerPsmData = parse_data(EXCHANGE, data)?;
        let psm = self.psm_address(&data)?;
        let (direction, calldata) = self.call(request, &data, self.augustus)?;

        // gem is pulled by the join adapter, DAI by the PSM itself
        let approve_target = match direction {
            Direction::SellGem => data.gem_join_address,
            Direction::BuyGem => psm,
        };

        Ok(SimpleExchangeParam {
            approve_target,
            calldata,
            target_exchange: psm,
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
        let data: MakerPsmData = parse_data(EXCHANGE, data)?;
        let (direction, calldata) = self.call(request, &data, recipient)?;

        // gemAmt is an input amount for sellGem and an output amount for buyGem
        let amount_field = match direction {
            Direction::SellGem => PatchField::FromAmount,
            Direction::BuyGem => PatchField::ToAmount,
        };
        let layout = CallLayout::new(self.abi.function(Self::signature(direction))?)
            .with_slot(amount_field, FieldPath::arg(1))
            .with_slot(PatchField::Recipient, FieldPath::arg(0));

        Ok(DexExchangeParam {
            needs_wrap_native: false,
            has_recipient_param: true,
            has_dest_token_param: false,
            sends_native_value: false,
            exchange_data: calldata,
            target_exchange: self.psm_address(&data)?,
            special_exchange: Some(MAKER_PSM_SPECIAL_EXCHANGE),
            layout,
        })
    }
}
