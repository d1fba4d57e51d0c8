//! Cosmos transaction wire format.
//!
//! Hand-written prost messages for the subset of the Cosmos SDK tx protobuf
//! the validator needs: a single `MsgSend` inside a `TxBody`, an `AuthInfo`
//! with one multisig signer, and the `TxRaw` envelope whose outer signature
//! slot carries a `MultiSignature` aggregated over a `CompactBitArray`.
//! Field numbers match the SDK's `.proto` definitions.

/// `cosmos.base.v1beta1.Coin`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// `cosmos.bank.v1beta1.MsgSend`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

/// `google.protobuf.Any`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// `cosmos.tx.v1beta1.TxBody`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

/// `cosmos.tx.v1beta1.Fee`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

/// `cosmos.crypto.multisig.v1beta1.CompactBitArray`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompactBitArray {
    #[prost(uint32, tag = "1")]
    pub extra_bits_stored: u32,
    #[prost(bytes = "vec", tag = "2")]
    pub elems: Vec<u8>,
}

/// `cosmos.tx.v1beta1.ModeInfo.Single`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Single {
    #[prost(int32, tag = "1")]
    pub mode: i32,
}

/// `cosmos.tx.v1beta1.ModeInfo.Multi`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Multi {
    #[prost(message, optional, tag = "1")]
    pub bitarray: Option<CompactBitArray>,
    #[prost(message, repeated, tag = "2")]
    pub mode_infos: Vec<ModeInfo>,
}

/// `cosmos.tx.v1beta1.ModeInfo`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModeInfo {
    #[prost(oneof = "mode_info::Sum", tags = "1, 2")]
    pub sum: Option<mode_info::Sum>,
}

pub mod mode_info {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Sum {
        #[prost(message, tag = "1")]
        Single(super::Single),
        #[prost(message, tag = "2")]
        Multi(super::Multi),
    }
}

/// `cosmos.tx.v1beta1.SignerInfo`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

/// `cosmos.tx.v1beta1.AuthInfo`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

/// `cosmos.tx.v1beta1.TxRaw`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

/// `cosmos.crypto.multisig.v1beta1.MultiSignature`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MultiSignature {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub signatures: Vec<Vec<u8>>,
}

/// `cosmos.crypto.secp256k1.PubKey`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

/// `cosmos.crypto.multisig.LegacyAminoPubKey`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LegacyAminoPubKey {
    #[prost(uint32, tag = "1")]
    pub threshold: u32,
    #[prost(message, repeated, tag = "2")]
    pub public_keys: Vec<Any>,
}

/// Type URL of [`MsgSend`]
pub const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
/// Type URL of [`PubKey`]
pub const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
/// Type URL of [`LegacyAminoPubKey`]
pub const MULTISIG_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.multisig.LegacyAminoPubKey";

/// `SIGN_MODE_LEGACY_AMINO_JSON`, the mode multisig members sign under
pub const SIGN_MODE_LEGACY_AMINO_JSON: i32 = 127;
