//! Ethereum Helpers Module
//!
//! Address normalization, EIP-712 hashing for the mint authorization, and
//! signature bookkeeping shared by the mint signer and its tests.

pub mod address;
pub mod eip712;

pub use address::{checksum_address, is_zero_address, parse_address};
pub use eip712::{mint_digest, recover_signer, sort_signers_and_signatures};
