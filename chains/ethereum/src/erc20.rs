//! Minimal ERC-20 surface: the two functions a sweep needs.

use anyhow::{Context, Result};
use ethers::abi::{Abi, Token};
use ethers::types::{Address, Bytes, U256};
use std::sync::OnceLock;

const ERC20_ABI_JSON: &str = r#"[
    {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"transfer","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
]"#;

pub fn abi() -> &'static Abi {
    static ABI: OnceLock<Abi> = OnceLock::new();
    ABI.get_or_init(|| serde_json::from_str(ERC20_ABI_JSON).expect("static ERC-20 ABI parses"))
}

pub fn encode_transfer(to: Address, value: U256) -> Result<Bytes> {
    let function = abi().function("transfer").context("transfer not in ABI")?;
    let data = function
        .encode_input(&[Token::Address(to), Token::Uint(value)])
        .context("encode transfer calldata")?;
    Ok(Bytes::from(data))
}

pub fn encode_balance_of(owner: Address) -> Result<Bytes> {
    let function = abi().function("balanceOf").context("balanceOf not in ABI")?;
    let data = function
        .encode_input(&[Token::Address(owner)])
        .context("encode balanceOf calldata")?;
    Ok(Bytes::from(data))
}

pub fn decode_balance(output: &[u8]) -> Result<U256> {
    let function = abi().function("balanceOf").context("balanceOf not in ABI")?;
    let tokens = function
        .decode_output(output)
        .context("decode balanceOf output")?;
    tokens
        .first()
        .and_then(|t| t.clone().into_uint())
        .context("balanceOf returned no uint")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_calldata_uses_the_canonical_selector() {
        let to: Address = "0xdd00000000000000000000000000000000000001"
            .parse()
            .unwrap();
        let data = encode_transfer(to, U256::from(1_000_000u64)).unwrap();
        // keccak("transfer(address,uint256)")[..4]
        assert_eq!(data[..4], [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(data.len(), 4 + 32 + 32);
    }

    #[test]
    fn balance_roundtrip() {
        let output = ethers::abi::encode(&[Token::Uint(U256::from(42u64))]);
        assert_eq!(decode_balance(&output).unwrap(), U256::from(42u64));
    }
}
