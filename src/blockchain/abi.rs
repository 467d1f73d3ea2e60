//! ERC-20 ABI definitions.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// The subset of the ERC-20 interface the gateway calls.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Encode a `transfer(address,uint256)` call.
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    Bytes::from(IERC20::transferCall { to, amount }.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_layout() {
        let to: Address = "0x742d35cc6634c0532925a3b844bc454e4438f44e".parse().unwrap();
        let data = encode_transfer(to, U256::from(1000u64));

        // selector + padded address + padded amount
        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(U256::from_be_slice(&data[36..68]), U256::from(1000u64));
    }

    #[test]
    fn test_decimals_selector() {
        let encoded = IERC20::decimalsCall {}.abi_encode();
        assert_eq!(encoded, vec![0x31, 0x3c, 0xe5, 0x67]);
    }
}
