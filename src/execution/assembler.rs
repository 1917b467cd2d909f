//! # Execution Plan Assembler
//!
//! Validates a decided route, asks each hop's adapter for its call, resolves the
//! patchable offsets, packs every hop (plus any wrap/unwrap step) into an
//! instruction and concatenates them in execution order.
//!
//! Hop indices in errors are flattened across legs and count swap hops only.

use crate::config::NetworkConfig;
use crate::dex::{AdapterRegistry, DexAdapter};
use crate::errors::{CompileError, DecodeError, PositionError};
use crate::execution::encoder::{
    decode_plan, encode_instruction, ExecutorVersion, InstructionFields, InstructionLayout,
    PackedInstruction,
};
use crate::execution::flags::InstructionFlags;
use crate::execution::positions::resolve_positions;
use crate::types::{DexExchangeParam, Hop, Leg, LegStep, SwapDescriptor, SwapRequest, SwapSide};
use ethers::types::{Address, Bytes, U256};
use tracing::{debug, info, trace};

const SPLIT_TOTAL: u32 = 100;
const WRAPPER_KEY: &str = "weth";

/// The compiled route. Immutable once returned.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub executor: ExecutorVersion,
    /// Concatenated instruction records, the executor's input.
    pub data: Bytes,
    pub instructions: Vec<PackedInstruction>,
    /// Contract the caller must approve for the source token.
    pub approval_target: Address,
    /// Executor contract the transaction is sent to.
    pub target_executor: Address,
}

impl ExecutionPlan {
    /// Decode `data` back into per-instruction fields.
    pub fn decode(&self) -> Result<Vec<InstructionFields>, DecodeError> {
        decode_plan(&self.data, self.executor.layout())
    }
}

/// How a leg handles the native token on its edges.
#[derive(Debug, Clone, Copy, Default)]
struct NativeEdges {
    wrap: bool,
    unwrap: bool,
}

/// Compiles routes for one network. Holds no per-route state.
#[derive(Debug)]
pub struct PlanAssembler {
    config: NetworkConfig,
    registry: AdapterRegistry,
}

impl PlanAssembler {
    pub fn new(config: NetworkConfig) -> Self {
        let registry = AdapterRegistry::new(&config);
        Self { config, registry }
    }

    pub fn with_registry(config: NetworkConfig, registry: AdapterRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn registry(&self) -> &AdapterRegistry {
        &self.registry
    }

    /// Compile a route for the given executor version.
    ///
    /// All-or-nothing: the first failing check aborts the route and nothing
    /// already encoded escapes.
    pub fn compile(
        &self,
        descriptor: &SwapDescriptor,
        executor: ExecutorVersion,
    ) -> Result<ExecutionPlan, CompileError> {
        let target_executor = self
            .config
            .executor_address(executor)
            .ok_or_else(|| CompileError::UnknownExecutor(executor.to_string()))?;

        self.validate_route(descriptor)?;

        let layout = executor.layout();
        let mut instructions = Vec::new();
        let mut hop_index = 0usize;

        for (leg_index, leg) in descriptor.legs.iter().enumerate() {
            let hop_count = leg.hops().count();
            validate_split(leg, leg_index, hop_index)?;
            self.validate_wrap_placement(leg, hop_index)?;

            let mut params = Vec::with_capacity(hop_count);
            for (offset, hop) in leg.hops().enumerate() {
                params.push(self.hop_param(descriptor.side, leg, hop, hop_index + offset, target_executor)?);
            }

            let edges = self.native_edges(leg, &params, hop_index)?;
            trace!(leg = leg_index, wrap = edges.wrap, unwrap = edges.unwrap, "resolved native edges");

            if edges.wrap {
                let amount = leg_total(leg, leg_index, hop_index, "srcAmount", |hop| hop.src_amount)?;
                let param = self
                    .registry
                    .wrapper()
                    .wrap_param(amount)
                    .map_err(|e| CompileError::from_adapter(hop_index, WRAPPER_KEY, e))?;
                instructions.push(pack(&param, InstructionFlags::empty(), false, hop_index, layout)?);
            }

            for (offset, param) in params.iter().enumerate() {
                let mut flags = InstructionFlags::empty();
                flags.set(InstructionFlags::NEEDS_WRAP, edges.wrap);
                flags.set(InstructionFlags::UNWRAP_OUTPUT, edges.unwrap);
                // later legs consume the previous leg's output through fromAmount
                let chained = leg_index > 0;
                instructions.push(pack(param, flags, chained, hop_index + offset, layout)?);
            }

            if edges.unwrap {
                let amount = leg_total(leg, leg_index, hop_index, "destAmount", |hop| hop.dest_amount)?;
                let last_hop = hop_index + hop_count - 1;
                let param = self
                    .registry
                    .wrapper()
                    .unwrap_param(amount)
                    .map_err(|e| CompileError::from_adapter(last_hop, WRAPPER_KEY, e))?;
                instructions.push(pack(&param, InstructionFlags::empty(), false, last_hop, layout)?);
            }

            hop_index += hop_count;
        }

        let data: Vec<u8> = instructions.iter().flat_map(|i| i.as_bytes().iter().copied()).collect();
        info!(
            executor = %executor,
            hops = hop_index,
            instructions = instructions.len(),
            bytes = data.len(),
            "compiled execution plan"
        );

        Ok(ExecutionPlan {
            executor,
            data: data.into(),
            instructions,
            approval_target: self.config.token_transfer_proxy_address,
            target_executor,
        })
    }

    /// Legs must be non-empty, chain token to token, and span the descriptor's pair.
    fn validate_route(&self, descriptor: &SwapDescriptor) -> Result<(), CompileError> {
        let (first, last) = match (descriptor.legs.first(), descriptor.legs.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(CompileError::InvalidRoute("route has no legs".to_string())),
        };
        if first.src_token != descriptor.src_token {
            return Err(CompileError::InvalidRoute(format!(
                "first leg starts at {:?}, route source is {:?}",
                first.src_token, descriptor.src_token
            )));
        }
        if last.dest_token != descriptor.dest_token {
            return Err(CompileError::InvalidRoute(format!(
                "last leg ends at {:?}, route destination is {:?}",
                last.dest_token, descriptor.dest_token
            )));
        }
        for (index, leg) in descriptor.legs.iter().enumerate() {
            if leg.hops().next().is_none() {
                return Err(CompileError::InvalidRoute(format!("leg {} has no swap hops", index)));
            }
        }
        for (index, pair) in descriptor.legs.windows(2).enumerate() {
            if pair[0].dest_token != pair[1].src_token {
                return Err(CompileError::InvalidRoute(format!(
                    "leg {} ends at {:?} but leg {} starts at {:?}",
                    index,
                    pair[0].dest_token,
                    index + 1,
                    pair[1].src_token
                )));
            }
        }
        Ok(())
    }

    /// Wrap only as the first step, unwrap only as the last, each at most once
    /// and only on a native edge of the leg.
    fn validate_wrap_placement(&self, leg: &Leg, first_hop: usize) -> Result<(), CompileError> {
        let last = leg.steps.len().saturating_sub(1);
        let invalid = |reason: String| CompileError::InvalidWrapPlacement { hop: first_hop, reason };

        for (position, step) in leg.steps.iter().enumerate() {
            match step {
                LegStep::WrapNative if position != 0 => {
                    return Err(invalid(format!(
                        "wrap-native at step {} of {}; only the first step may wrap",
                        position,
                        leg.steps.len()
                    )));
                }
                LegStep::WrapNative if !self.config.is_native(leg.src_token) => {
                    return Err(invalid("wrap-native on a leg whose source is not the native token".to_string()));
                }
                LegStep::UnwrapNative if position != last => {
                    return Err(invalid(format!(
                        "unwrap-native at step {} of {}; only the last step may unwrap",
                        position,
                        leg.steps.len()
                    )));
                }
                LegStep::UnwrapNative if !self.config.is_native(leg.dest_token) => {
                    return Err(invalid(
                        "unwrap-native on a leg whose destination is not the native token".to_string(),
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn hop_param(
        &self,
        side: SwapSide,
        leg: &Leg,
        hop: &Hop,
        hop_index: usize,
        recipient: Address,
    ) -> Result<DexExchangeParam, CompileError> {
        let adapter = self.registry.get(&hop.exchange).ok_or_else(|| CompileError::UnknownExchange {
            hop: hop_index,
            exchange: hop.exchange.clone(),
        })?;
        let request = SwapRequest {
            src_token: leg.src_token,
            dest_token: leg.dest_token,
            src_amount: hop.src_amount,
            dest_amount: hop.dest_amount,
            side,
        };
        adapter
            .dex_param(&request, recipient, &hop.data)
            .map_err(|e| CompileError::from_adapter(hop_index, &hop.exchange, e))
    }

    /// Decide whether the leg is wrapped on entry and unwrapped on exit.
    ///
    /// A wrapping edge applies to every hop in the leg, so hops that want native
    /// input cannot share a leg with hops that want it wrapped.
    fn native_edges(
        &self,
        leg: &Leg,
        params: &[DexExchangeParam],
        first_hop: usize,
    ) -> Result<NativeEdges, CompileError> {
        let any_wraps = params.iter().any(|p| p.needs_wrap_native);
        let explicit_wrap = leg.steps.iter().any(|s| matches!(s, LegStep::WrapNative));
        let explicit_unwrap = leg.steps.iter().any(|s| matches!(s, LegStep::UnwrapNative));

        let edges = NativeEdges {
            wrap: explicit_wrap || (any_wraps && self.config.is_native(leg.src_token)),
            unwrap: explicit_unwrap || (any_wraps && self.config.is_native(leg.dest_token)),
        };

        if edges.wrap || edges.unwrap {
            if let Some(offset) = params.iter().position(|p| !p.needs_wrap_native) {
                return Err(CompileError::InvalidWrapPlacement {
                    hop: first_hop + offset,
                    reason: "hop takes the native token directly but its leg is wrapped".to_string(),
                });
            }
        }
        Ok(edges)
    }
}

/// Sum of one amount over every hop of a leg. Overflow rejects the route.
fn leg_total(
    leg: &Leg,
    leg_index: usize,
    first_hop: usize,
    field: &'static str,
    amount: impl Fn(&Hop) -> U256,
) -> Result<U256, CompileError> {
    leg.hops().try_fold(U256::zero(), |acc, hop| {
        acc.checked_add(amount(hop)).ok_or(CompileError::AmountOverflow {
            leg: leg_index,
            hop: first_hop,
            field,
        })
    })
}

/// Sum of split shares in one leg must be exactly 100.
fn validate_split(leg: &Leg, leg_index: usize, first_hop: usize) -> Result<(), CompileError> {
    let total = leg.hops().fold(0u32, |acc, hop| acc.saturating_add(hop.percent));
    if total != SPLIT_TOTAL {
        return Err(CompileError::InvalidSplit {
            leg: leg_index,
            hop: first_hop,
            total,
        });
    }
    Ok(())
}

/// Resolve offsets and encode one exchange call.
fn pack(
    param: &DexExchangeParam,
    mut flags: InstructionFlags,
    chained: bool,
    hop: usize,
    layout: InstructionLayout,
) -> Result<PackedInstruction, CompileError> {
    let positions = resolve_positions(&param.layout, &param.exchange_data)
        .map_err(|source| CompileError::PositionResolution { hop, source })?;
    if chained && positions.from_amount.is_none() {
        return Err(CompileError::PositionResolution {
            hop,
            source: PositionError::MissingChainedAmount,
        });
    }

    flags.set(InstructionFlags::NO_RECIPIENT_PARAM, !param.has_recipient_param);
    flags.set(InstructionFlags::NO_DEST_TOKEN_PARAM, !param.has_dest_token_param);
    flags.set(InstructionFlags::SEND_NATIVE_VALUE, param.sends_native_value);

    let fields = InstructionFields {
        target: param.target_exchange,
        positions,
        special_exchange: param.special_exchange,
        flags,
        calldata: param.exchange_data.clone(),
    };
    let instruction = encode_instruction(&fields, layout)
        .map_err(|source| CompileError::EncodingOverflow { hop, source })?;

    debug!(
        hop,
        target = ?param.target_exchange,
        ?positions,
        bytes = instruction.len(),
        "packed instruction"
    );
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dex::test_support::mainnet;
    use crate::errors::AdapterError;
    use serde_json::json;

    fn assembler() -> PlanAssembler {
        let mut config = mainnet();
        config.executors_addresses.insert(ExecutorVersion::Executor01, Address::repeat_byte(0xe1));
        config.executors_addresses.insert(ExecutorVersion::Executor03, Address::repeat_byte(0xe3));
        PlanAssembler::new(config)
    }

    fn hop(exchange: &str, percent: u32, data: serde_json::Value) -> Hop {
        Hop {
            exchange: exchange.to_string(),
            percent,
            src_amount: U256::from(1_000u64),
            dest_amount: U256::from(900u64),
            data,
        }
    }

    fn route(side: SwapSide, legs: Vec<Leg>) -> SwapDescriptor {
        SwapDescriptor {
            side,
            src_token: legs[0].src_token,
            dest_token: legs[legs.len() - 1].dest_token,
            src_amount: U256::from(1_000u64),
            dest_amount: U256::from(900u64),
            legs,
        }
    }

    #[test]
    fn test_split_must_sum_to_exactly_100() {
        let (a, b) = (Address::random(), Address::random());
        let leg = Leg::new(a, b, vec![hop("uniswapv2", 60, json!({})), hop("uniswapv2", 30, json!({}))]);

        let err = assembler().compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        assert!(matches!(err, CompileError::InvalidSplit { leg: 0, hop: 0, total: 90 }), "{:?}", err);
    }

    #[test]
    fn test_wrap_as_last_step_is_rejected() {
        let assembler = assembler();
        let native = assembler.config().native_token_address;
        let mut leg = Leg::new(native, Address::random(), vec![hop("uniswapv2", 100, json!({}))]);
        leg.steps.push(LegStep::WrapNative);

        let err = assembler.compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        assert!(matches!(err, CompileError::InvalidWrapPlacement { hop: 0, .. }), "{:?}", err);
    }

    #[test]
    fn test_unwrap_on_non_native_destination_is_rejected() {
        let mut leg = Leg::new(Address::random(), Address::random(), vec![hop("uniswapv2", 100, json!({}))]);
        leg.steps.push(LegStep::UnwrapNative);

        let err = assembler().compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        assert!(matches!(err, CompileError::InvalidWrapPlacement { .. }));
    }

    #[test]
    fn test_buy_on_sell_only_exchange_reports_hop() {
        let (a, b) = (Address::random(), Address::random());
        let leg = Leg::new(
            a,
            b,
            vec![
                hop("uniswapv2", 50, json!({})),
                hop("bancor", 50, json!({ "path": [a, b] })),
            ],
        );

        let err = assembler().compile(&route(SwapSide::Buy, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        assert!(
            matches!(&err, CompileError::UnsupportedSide { hop: 1, exchange, side: SwapSide::Buy } if exchange == "bancor"),
            "{:?}",
            err
        );
        assert_eq!(err.hop_index(), Some(1));
    }

    #[test]
    fn test_wrap_amount_overflow_is_rejected() {
        let assembler = assembler();
        let native = assembler.config().native_token_address;
        let half = U256::MAX / 2 + 1;
        let mut hops = vec![hop("uniswapv2", 50, json!({})), hop("uniswapv2", 50, json!({}))];
        for h in &mut hops {
            h.src_amount = half;
        }
        let leg = Leg::new(native, Address::random(), hops);

        let err = assembler.compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        assert!(
            matches!(err, CompileError::AmountOverflow { leg: 0, hop: 0, field: "srcAmount" }),
            "{:?}",
            err
        );
        assert_eq!(err.hop_index(), Some(0));
    }

    #[test]
    fn test_unwrap_amount_overflow_is_rejected() {
        let assembler = assembler();
        let native = assembler.config().native_token_address;
        let (a, b) = (Address::random(), Address::random());
        let first = Leg::new(a, b, vec![hop("uniswapv2", 100, json!({}))]);
        let mut hops = vec![hop("uniswapv2", 50, json!({})), hop("uniswapv2", 50, json!({}))];
        for h in &mut hops {
            h.dest_amount = U256::MAX;
        }
        let second = Leg::new(b, native, hops);

        let err = assembler
            .compile(&route(SwapSide::Sell, vec![first, second]), ExecutorVersion::Executor01)
            .unwrap_err();
        assert!(
            matches!(err, CompileError::AmountOverflow { leg: 1, hop: 1, field: "destAmount" }),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_native_source_gets_wrap_step() {
        let assembler = assembler();
        let native = assembler.config().native_token_address;
        let wrapped = assembler.config().wrapped_native_token_address;
        let leg = Leg::new(native, Address::random(), vec![hop("uniswapv2", 100, json!({}))]);

        let plan = assembler.compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap();
        let decoded = plan.decode().unwrap();

        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].target, wrapped);
        assert!(decoded[0].flags.sends_native_value());
        assert!(decoded[1].flags.needs_wrap());
        assert!(!decoded[1].flags.unwraps_output());
    }

    #[test]
    fn test_native_destination_gets_unwrap_step() {
        let assembler = assembler();
        let native = assembler.config().native_token_address;
        let leg = Leg::new(Address::random(), native, vec![hop("uniswapv2", 100, json!({}))]);

        let plan = assembler.compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor03).unwrap();
        let decoded = plan.decode().unwrap();

        assert_eq!(decoded.len(), 2);
        assert!(decoded[0].flags.unwraps_output());
        assert_eq!(decoded[1].positions.from_amount, Some(4));
        assert_eq!(decoded[1].calldata[..4], [0x2e, 0x1a, 0x7d, 0x4d]);
    }

    #[test]
    fn test_unknown_exchange_and_executor() {
        let (a, b) = (Address::random(), Address::random());
        let leg = Leg::new(a, b, vec![hop("curve", 100, json!({}))]);
        let descriptor = route(SwapSide::Sell, vec![leg]);
        let assembler = assembler();

        let err = assembler.compile(&descriptor, ExecutorVersion::Executor01).unwrap_err();
        assert!(matches!(err, CompileError::UnknownExchange { hop: 0, .. }));

        let err = assembler.compile(&descriptor, ExecutorVersion::Executor02).unwrap_err();
        assert!(matches!(err, CompileError::UnknownExecutor(_)));
    }

    #[test]
    fn test_legs_must_chain() {
        let leg1 = Leg::new(Address::random(), Address::random(), vec![hop("uniswapv2", 100, json!({}))]);
        let leg2 = Leg::new(Address::random(), Address::random(), vec![hop("uniswapv2", 100, json!({}))]);

        let err = assembler().compile(&route(SwapSide::Sell, vec![leg1, leg2]), ExecutorVersion::Executor01).unwrap_err();
        assert!(matches!(err, CompileError::InvalidRoute(_)));
        assert_eq!(err.hop_index(), None);
    }

    #[test]
    fn test_chained_hop_without_from_amount_fails() {
        let (a, dai, gem) = (Address::random(), Address::random(), Address::random());
        let psm = json!({
            "psmAddress": Address::repeat_byte(0x89),
            "gemJoinAddress": Address::repeat_byte(0x0a),
            "gem": gem,
            "dai": dai,
        });
        let legs = vec![
            Leg::new(a, dai, vec![hop("uniswapv2", 100, json!({}))]),
            // buyGem only exposes the gem output amount
            Leg::new(dai, gem, vec![hop("makerpsm", 100, psm)]),
        ];

        let err = assembler().compile(&route(SwapSide::Sell, legs), ExecutorVersion::Executor03).unwrap_err();
        assert!(
            matches!(
                err,
                CompileError::PositionResolution { hop: 1, source: PositionError::MissingChainedAmount }
            ),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_adapter_data_errors_keep_exchange() {
        let (a, b) = (Address::random(), Address::random());
        let leg = Leg::new(a, b, vec![hop("bancor", 100, json!({ "path": "nope" }))]);

        let err = assembler().compile(&route(SwapSide::Sell, vec![leg]), ExecutorVersion::Executor01).unwrap_err();
        match err {
            CompileError::Adapter { hop, exchange, source } => {
                assert_eq!(hop, 0);
                assert_eq!(exchange, "bancor");
                assert!(matches!(source, AdapterError::InvalidData { .. }));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
