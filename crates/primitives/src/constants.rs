use alloy_primitives::{address, b256, keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;

/// Gas limit reserved for the `anchor` and `anchorV2` transactions, on top of the proposal gas
/// limit.
pub const ANCHOR_GAS_LIMIT: u64 = 250_000;

/// Gas limit reserved for the `anchorV3` transaction, on top of the batch gas limit.
pub const ANCHOR_V3_GAS_LIMIT: u64 = 1_000_000;

/// Maximum size of a calldata transaction list: `(32 - 1) * 4096` bytes.
pub const BLOCK_MAX_TX_LIST_BYTES: u64 = 126_976;

/// Maximum distance between the beacon sync target and a new target before a resync is needed.
pub const RESYNC_GAP: u64 = 64;

/// The account allowed to send anchor transactions.
pub const GOLDEN_TOUCH_ADDRESS: Address = address!("0x0000777735367b36bC9B61C50022d9D0700dB4Ec");

/// The well known private key of [`GOLDEN_TOUCH_ADDRESS`].
pub const GOLDEN_TOUCH_PRIVATE_KEY: B256 =
    b256!("0x92954368afd3caa1f3ce3ead0069c1af414054aefe1ef9aeacc1bf426222ce38");

/// The domain string mixed into the Pacaya block difficulty.
const DIFFICULTY_DOMAIN: &str = "TAIKO_DIFFICULTY";

/// Returns the mix hash of the Pacaya block with the given id:
/// `keccak256(abi.encode("TAIKO_DIFFICULTY", block_id))`.
pub fn pacaya_difficulty(block_id: u64) -> B256 {
    keccak256((DIFFICULTY_DOMAIN.to_string(), U256::from(block_id)).abi_encode_params())
}

/// Returns the address of the L2 anchor contract for the chain, which is the decimal chain id
/// followed by zero padding and `10001`.
pub fn anchor_address(chain_id: u64) -> Option<Address> {
    const SUFFIX: &str = "10001";
    let prefix = chain_id.to_string();
    let width = 40usize.checked_sub(prefix.len())?;
    if width < SUFFIX.len() {
        return None
    }
    format!("{prefix}{SUFFIX:0>width$}").parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_is_deterministic() {
        for id in [0u64, 1, 2, 1_000, u64::MAX] {
            assert_eq!(pacaya_difficulty(id), pacaya_difficulty(id));
        }
        assert_ne!(pacaya_difficulty(1), pacaya_difficulty(2));
    }

    #[test]
    fn test_difficulty_encodes_string_and_uint() {
        // head: offset of the string (0x40) and the uint, tail: length and padded bytes.
        let mut expected = Vec::new();
        expected.extend_from_slice(&U256::from(0x40).to_be_bytes::<32>());
        expected.extend_from_slice(&U256::from(7).to_be_bytes::<32>());
        expected.extend_from_slice(&U256::from(DIFFICULTY_DOMAIN.len()).to_be_bytes::<32>());
        let mut padded = [0u8; 32];
        padded[..DIFFICULTY_DOMAIN.len()].copy_from_slice(DIFFICULTY_DOMAIN.as_bytes());
        expected.extend_from_slice(&padded);

        assert_eq!(pacaya_difficulty(7), keccak256(expected));
    }

    #[test]
    fn test_anchor_address() {
        assert_eq!(
            anchor_address(167000),
            Some(address!("0x1670000000000000000000000000000000010001"))
        );
        assert_eq!(
            anchor_address(167009),
            Some(address!("0x1670090000000000000000000000000000010001"))
        );
    }
}
