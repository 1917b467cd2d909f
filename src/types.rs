//! # Route and Exchange Parameter Types
//!
//! Shared data model for the route compiler: the already-decided swap route
//! handed in by route selection, and the parameter records every exchange
//! adapter produces for one hop.

use crate::execution::positions::CallLayout;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

//================================================================================================//
//                                          Swap Route                                            //
//================================================================================================//

/// Which leg of the trade is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwapSide {
    /// `src_amount` is fixed, `dest_amount` is the minimum received.
    Sell,
    /// `dest_amount` is fixed (desired output), `src_amount` is the maximum spent.
    Buy,
}

impl fmt::Display for SwapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapSide::Sell => write!(f, "SELL"),
            SwapSide::Buy => write!(f, "BUY"),
        }
    }
}

/// A fully decided route, produced by route selection and read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapDescriptor {
    pub side: SwapSide,
    pub src_token: Address,
    pub dest_token: Address,
    pub src_amount: U256,
    pub dest_amount: U256,
    pub legs: Vec<Leg>,
}

impl SwapDescriptor {
    /// Number of swap hops across all legs, ignoring wrap/unwrap directives.
    pub fn hop_count(&self) -> usize {
        self.legs.iter().map(|leg| leg.hops().count()).sum()
    }
}

/// The contiguous, possibly split, portion of a route from one token to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub src_token: Address,
    pub dest_token: Address,
    pub steps: Vec<LegStep>,
}

impl Leg {
    /// Convenience constructor for a leg made only of swap hops.
    pub fn new(src_token: Address, dest_token: Address, hops: Vec<Hop>) -> Self {
        Self {
            src_token,
            dest_token,
            steps: hops.into_iter().map(LegStep::Swap).collect(),
        }
    }

    pub fn hops(&self) -> impl Iterator<Item = &Hop> {
        self.steps.iter().filter_map(|step| match step {
            LegStep::Swap(hop) => Some(hop),
            _ => None,
        })
    }
}

/// One step of a leg. Route selection may request wrap/unwrap explicitly; the
/// assembler also inserts them when an adapter asks for wrapped native input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LegStep {
    Swap(Hop),
    WrapNative,
    UnwrapNative,
}

/// One exchange call within a leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hop {
    /// Adapter key, e.g. `"bancor"` or `"uniswapv2"`.
    pub exchange: String,
    /// Share of the leg's volume routed through this hop. Shares in a leg sum to 100.
    pub percent: u32,
    pub src_amount: U256,
    pub dest_amount: U256,
    /// Exchange-specific payload, interpreted only by the adapter.
    #[serde(default)]
    pub data: serde_json::Value,
}

//================================================================================================//
//                                      Adapter Parameters                                        //
//================================================================================================//

/// Generic swap request handed to an adapter for one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRequest {
    pub src_token: Address,
    pub dest_token: Address,
    pub src_amount: U256,
    pub dest_amount: U256,
    pub side: SwapSide,
}

/// Payload for the intermediate on-chain adapter contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterExchangeParam {
    pub target_exchange: Address,
    pub payload: Bytes,
    pub network_fee: U256,
}

/// Self-contained call that can be executed directly, without adapter indirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleExchangeParam {
    /// Contract the source token must be approved to.
    pub approve_target: Address,
    pub calldata: Bytes,
    pub target_exchange: Address,
    /// Native value to attach to the call.
    pub value: U256,
    pub network_fee: U256,
}

/// The structured form consumed by the position resolver and instruction encoder.
#[derive(Debug, Clone)]
pub struct DexExchangeParam {
    /// Exchange cannot take the native token and needs it wrapped first.
    pub needs_wrap_native: bool,
    pub has_recipient_param: bool,
    pub has_dest_token_param: bool,
    /// Exchange takes the native token as call value.
    pub sends_native_value: bool,
    pub exchange_data: Bytes,
    pub target_exchange: Address,
    /// Identifier of the on-chain special-case code path, if any.
    pub special_exchange: Option<u16>,
    /// Where each patchable field sits in `exchange_data`.
    pub layout: CallLayout,
}

/// Byte offsets inside one hop's raw calldata that the executor patches at run time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldPositions {
    pub from_amount: Option<u16>,
    pub to_amount: Option<u16>,
    pub src_token: Option<u16>,
    pub return_amount: Option<u16>,
}

impl FieldPositions {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<u16>)> {
        [
            ("fromAmount", self.from_amount),
            ("toAmount", self.to_amount),
            ("srcToken", self.src_token),
            ("returnAmount", self.return_amount),
        ]
        .into_iter()
    }
}
