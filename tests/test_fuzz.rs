use ethers::types::{Address, U256};
use eyre::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use route_compiler::{
    execution::encoder::{ADDRESS_LEN, HEADER_LEN, PADDING_LEN},
    CompileError, ExecutorVersion, Hop, InstructionFlags, Leg, SwapDescriptor, SwapSide,
};
use tracing::debug;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::*;

const FUZZ_ITERATIONS: usize = 200;
const MAX_LEGS: usize = 4;
const MAX_SPLITS: usize = 3;
const EXECUTORS: [ExecutorVersion; 3] = [
    ExecutorVersion::Executor01,
    ExecutorVersion::Executor02,
    ExecutorVersion::Executor03,
];

/// Split 100 into `parts` positive shares.
fn random_split(rng: &mut StdRng, parts: usize) -> Vec<u32> {
    let mut shares = Vec::with_capacity(parts);
    let mut left = 100u32;
    for remaining in (1..parts).rev() {
        let share = rng.gen_range(1..=left - remaining as u32);
        shares.push(share);
        left -= share;
    }
    shares.push(left);
    shares
}

fn random_hop(rng: &mut StdRng, src: Address, dest: Address, percent: u32) -> Hop {
    let src_amount = rng.gen_range(1..u64::MAX / 2);
    let dest_amount = rng.gen_range(1..u64::MAX / 2);
    if rng.gen_bool(0.3) {
        bancor_hop(percent, &[src, dest], src_amount, dest_amount)
    } else {
        uniswap_hop(percent, src_amount, dest_amount)
    }
}

fn random_route(rng: &mut StdRng) -> SwapDescriptor {
    let legs_count = rng.gen_range(1..=MAX_LEGS);
    let tokens: Vec<Address> = (0..=legs_count).map(|_| Address::random_using(rng)).collect();
    let legs = tokens
        .windows(2)
        .map(|pair| {
            let parts = rng.gen_range(1..=MAX_SPLITS);
            let shares = random_split(rng, parts);
            let hops = shares
                .into_iter()
                .map(|percent| random_hop(rng, pair[0], pair[1], percent))
                .collect();
            Leg::new(pair[0], pair[1], hops)
        })
        .collect();
    descriptor(SwapSide::Sell, legs)
}

#[test]
fn fuzz_compiled_records_hold_wire_invariants() -> Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let assembler = assembler();

    for iteration in 0..FUZZ_ITERATIONS {
        let route = random_route(&mut rng);
        let executor = EXECUTORS[rng.gen_range(0..EXECUTORS.len())];
        let plan = assembler.compile(&route, executor)?;
        debug!(iteration, %executor, hops = route.hop_count(), "compiled fuzz route");

        let decoded = plan.decode()?;
        assert_eq!(decoded.len(), route.hop_count());

        for (instruction, fields) in plan.instructions.iter().zip(&decoded) {
            let bytes = instruction.as_bytes();
            let calldata_len = instruction.calldata().len();

            // length field is exact
            let length_field = match executor.layout() {
                route_compiler::execution::InstructionLayout::Basic => {
                    u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]) as usize
                }
                route_compiler::execution::InstructionLayout::MultiField => {
                    u16::from_be_bytes([bytes[20], bytes[21]]) as usize
                }
            };
            assert_eq!(length_field, calldata_len);
            assert_eq!(fields.calldata.len(), calldata_len);

            // padding is all zero
            assert!(bytes[HEADER_LEN - PADDING_LEN..HEADER_LEN].iter().all(|b| *b == 0));
            assert_eq!(&bytes[..ADDRESS_LEN], fields.target.as_bytes());

            // present offsets are in bounds; absent ones are flagged
            let positions = fields.positions;
            for (name, offset) in positions.iter() {
                if let Some(offset) = offset {
                    assert!((offset as usize) < calldata_len, "{} offset {} >= {}", name, offset, calldata_len);
                }
            }
            assert_eq!(
                fields.flags.contains(InstructionFlags::FROM_AMOUNT_ABSENT),
                positions.from_amount.is_none()
            );
            assert_eq!(
                fields.flags.contains(InstructionFlags::SRC_TOKEN_ABSENT),
                positions.src_token.is_none()
            );
            assert!(!fields.flags.has_unknown_bits());
        }
    }
    Ok(())
}

#[test]
fn fuzz_flags_do_not_depend_on_amounts() -> Result<()> {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed_0002);
    let assembler = assembler();

    for _ in 0..FUZZ_ITERATIONS / 4 {
        let route = random_route(&mut rng);
        let mut rescaled = route.clone();
        for leg in &mut rescaled.legs {
            for step in &mut leg.steps {
                if let route_compiler::LegStep::Swap(hop) = step {
                    hop.src_amount = hop.src_amount * U256::from(rng.gen_range(2u64..1_000));
                    hop.dest_amount = U256::one();
                }
            }
        }

        let flags = |route: &SwapDescriptor| -> Result<Vec<u16>> {
            Ok(assembler
                .compile(route, ExecutorVersion::Executor03)?
                .decode()?
                .iter()
                .map(|f| f.flags.bits())
                .collect())
        };
        assert_eq!(flags(&route)?, flags(&rescaled)?);
    }
    Ok(())
}

#[test]
fn fuzz_bad_splits_are_always_rejected() {
    init_tracing();
    let mut rng = StdRng::seed_from_u64(0x5eed_0003);
    let assembler = assembler();

    for _ in 0..FUZZ_ITERATIONS {
        let mut route = random_route(&mut rng);
        let leg_index = rng.gen_range(0..route.legs.len());
        let delta: u32 = rng.gen_range(1..50);

        // nudge one hop so its leg no longer sums to 100
        let leg = &mut route.legs[leg_index];
        let shrink = rng.gen_bool(0.5);
        for step in &mut leg.steps {
            if let route_compiler::LegStep::Swap(hop) = step {
                hop.percent = if shrink { hop.percent.saturating_sub(delta) } else { hop.percent + delta };
                break;
            }
        }
        let total: u32 = leg.hops().map(|h| h.percent).sum();
        if total == 100 {
            continue;
        }

        let err = assembler.compile(&route, ExecutorVersion::Executor01).unwrap_err();
        match err {
            CompileError::InvalidSplit { leg, total: reported, .. } => {
                assert!(leg <= leg_index);
                assert_ne!(reported, 100);
            }
            other => panic!("expected InvalidSplit, got {}", other),
        }
    }
}
