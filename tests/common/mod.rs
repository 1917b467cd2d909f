// Shared fixtures for the integration suites.

use ethers::types::{Address, U256};
use route_compiler::{Hop, Leg, NetworkConfig, PlanAssembler, SwapDescriptor, SwapSide};
use serde_json::json;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub const MAINNET_CONFIG: &str = r#"{
    "network": 1,
    "networkName": "Ethereum Mainnet",
    "wrappedNativeTokenAddress": "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2",
    "augustusAddress": "0xDEF171Fe48CF0115B1d80b88dc8eAB59176FEe57",
    "tokenTransferProxyAddress": "0x216b4b4ba9f3e719726886d34a177484278bfcae",
    "executorsAddresses": {
        "Executor01": "0x0C89964b85feA6825E1d0Bd8Bbd99f12591182ea",
        "Executor02": "0xFf8CBFD8FF204a80586AE856a93f174F121AE47A",
        "Executor03": "0x7d6b0ee2d15f7c3d3c0e3a1e2e9d6b6a4a9b7c11"
    },
    "adapterAddresses": {
        "Adapter01": "0x9bE264469eF954c139Da4A45Cf76CbCC5e3A6A73"
    },
    "exchangeAddresses": {
        "bancor": "0x2F9EC37d6CcFFf1caB21733BdaDEdE11c823cCB0",
        "bancorregistry": "0x52ae12abe5d8bd778bd5397f99ca900624cfadd4",
        "uniswapv2": "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
        "makerpsm": "0x89B78CfA322F6C5dE0aBcEecab66Aee45393cC5A"
    }
}"#;

pub fn mainnet() -> NetworkConfig {
    NetworkConfig::from_json_str(MAINNET_CONFIG).expect("fixture config is valid")
}

pub fn assembler() -> PlanAssembler {
    PlanAssembler::new(mainnet())
}

pub fn token(byte: u8) -> Address {
    Address::repeat_byte(byte)
}

pub fn uniswap_hop(percent: u32, src_amount: u64, dest_amount: u64) -> Hop {
    Hop {
        exchange: "uniswapv2".to_string(),
        percent,
        src_amount: U256::from(src_amount),
        dest_amount: U256::from(dest_amount),
        data: json!({}),
    }
}

pub fn bancor_hop(percent: u32, path: &[Address], src_amount: u64, dest_amount: u64) -> Hop {
    Hop {
        exchange: "bancor".to_string(),
        percent,
        src_amount: U256::from(src_amount),
        dest_amount: U256::from(dest_amount),
        data: json!({ "path": path }),
    }
}

pub fn descriptor(side: SwapSide, legs: Vec<Leg>) -> SwapDescriptor {
    let first = legs.first().expect("at least one leg");
    let last = legs.last().expect("at least one leg");
    let src_amount = first.hops().fold(U256::zero(), |acc, h| acc + h.src_amount);
    let dest_amount = last.hops().fold(U256::zero(), |acc, h| acc + h.dest_amount);
    SwapDescriptor {
        side,
        src_token: first.src_token,
        dest_token: last.dest_token,
        src_amount,
        dest_amount,
        legs,
    }
}
