//! Pocket return transaction construction and multisig signing.
//!
//! A return transaction sends `amount − fee` upokt from the vault multisig
//! back to a Pocket address, with the originating transaction hash as memo.
//! The first signer builds the transaction; every later signer decodes the
//! hex `return_tx`, injects its signature at the canonical slot, and
//! re-encodes, reusing the sequence embedded by the first signer. Multisig
//! members sign legacy amino JSON bytes, as the SDK requires for amino
//! threshold keys.

use anyhow::{Context, Result};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use prost::Message;
use sha2::{Digest, Sha256};

use super::keys::{bech32_from_bytes, MultisigKey};
use super::proto;
use crate::signer::ValidatorSigner;

/// Gas limit stamped on return transactions.
pub const RETURN_TX_GAS_LIMIT: u64 = 200_000;

/// Amino JSON type tag of the send message.
const AMINO_MSG_SEND_TYPE: &str = "cosmos-sdk/MsgSend";

/// Everything needed to build or co-sign a return transaction.
#[derive(Debug, Clone)]
pub struct ReturnTxParams {
    pub chain_id: String,
    pub bech32_prefix: String,
    pub coin_denom: String,
    /// Return recipient account
    pub to_address: [u8; 20],
    /// Amount after fee deduction, in upokt
    pub amount: u128,
    /// Fixed transaction fee in upokt
    pub fee: u64,
    /// Memo, the originating transaction hash
    pub memo: String,
    /// Account number of the multisig account on chain
    pub account_number: u64,
    /// Sequence of the multisig account; only used when building fresh
    pub sequence: u64,
}

/// Result of one signing step.
#[derive(Debug, Clone)]
pub struct SignedReturnTx {
    /// Hex-encoded `TxRaw` with this validator's signature included
    pub return_tx: String,
    /// Number of member signatures now present
    pub signature_count: usize,
}

// ============================================================================
// BIT ARRAY OPERATIONS
// ============================================================================

/// Creates an all-unset bit array over `bits` positions.
pub fn new_bitarray(bits: usize) -> proto::CompactBitArray {
    proto::CompactBitArray {
        extra_bits_stored: (bits % 8) as u32,
        elems: vec![0u8; (bits + 7) / 8],
    }
}

/// Number of addressable bits.
pub fn bitarray_len(bitarray: &proto::CompactBitArray) -> usize {
    if bitarray.elems.is_empty() {
        return 0;
    }
    if bitarray.extra_bits_stored == 0 {
        bitarray.elems.len() * 8
    } else {
        (bitarray.elems.len() - 1) * 8 + bitarray.extra_bits_stored as usize
    }
}

pub fn bitarray_get(bitarray: &proto::CompactBitArray, index: usize) -> bool {
    if index >= bitarray_len(bitarray) {
        return false;
    }
    bitarray.elems[index / 8] & (1 << (7 - (index % 8))) != 0
}

pub fn bitarray_set(bitarray: &mut proto::CompactBitArray, index: usize) {
    bitarray.elems[index / 8] |= 1 << (7 - (index % 8));
}

/// How many bits are set below `index`; the signature slot of member `index`.
pub fn bitarray_true_count_before(bitarray: &proto::CompactBitArray, index: usize) -> usize {
    (0..index).filter(|i| bitarray_get(bitarray, *i)).count()
}

// ============================================================================
// BUILD / DECODE / ENCODE
// ============================================================================

/// Builds the unsigned transaction the first co-signer starts from.
pub fn build_unsigned(
    multisig: &MultisigKey,
    params: &ReturnTxParams,
) -> Result<(proto::TxBody, proto::AuthInfo, proto::MultiSignature)> {
    let from_address = bech32_from_bytes(&params.bech32_prefix, &multisig.address())?;
    let to_address = bech32_from_bytes(&params.bech32_prefix, &params.to_address)?;

    let msg = proto::MsgSend {
        from_address,
        to_address,
        amount: vec![proto::Coin {
            denom: params.coin_denom.clone(),
            amount: params.amount.to_string(),
        }],
    };

    let body = proto::TxBody {
        messages: vec![proto::Any {
            type_url: proto::MSG_SEND_TYPE_URL.to_string(),
            value: msg.encode_to_vec(),
        }],
        memo: params.memo.clone(),
        timeout_height: 0,
    };

    let auth_info = proto::AuthInfo {
        signer_infos: vec![proto::SignerInfo {
            public_key: Some(multisig.to_any()),
            mode_info: Some(proto::ModeInfo {
                sum: Some(proto::mode_info::Sum::Multi(proto::Multi {
                    bitarray: Some(new_bitarray(multisig.num_signers())),
                    mode_infos: vec![],
                })),
            }),
            sequence: params.sequence,
        }],
        fee: Some(proto::Fee {
            amount: vec![proto::Coin {
                denom: params.coin_denom.clone(),
                amount: params.fee.to_string(),
            }],
            gas_limit: RETURN_TX_GAS_LIMIT,
            payer: String::new(),
            granter: String::new(),
        }),
    };

    Ok((body, auth_info, proto::MultiSignature::default()))
}

/// Decodes a hex `return_tx` back into its parts.
pub fn decode_return_tx(
    hex_tx: &str,
) -> Result<(proto::TxBody, proto::AuthInfo, proto::MultiSignature)> {
    let raw_bytes = hex::decode(hex_tx.trim_start_matches("0x"))
        .context("return_tx is not valid hex")?;
    let raw = proto::TxRaw::decode(raw_bytes.as_slice()).context("Failed to decode TxRaw")?;
    let body =
        proto::TxBody::decode(raw.body_bytes.as_slice()).context("Failed to decode TxBody")?;
    let auth_info = proto::AuthInfo::decode(raw.auth_info_bytes.as_slice())
        .context("Failed to decode AuthInfo")?;
    let multi_sig = match raw.signatures.first() {
        Some(bytes) => proto::MultiSignature::decode(bytes.as_slice())
            .context("Failed to decode MultiSignature")?,
        None => proto::MultiSignature::default(),
    };
    Ok((body, auth_info, multi_sig))
}

/// Re-encodes transaction parts into the hex `return_tx` form.
pub fn encode_return_tx(
    body: &proto::TxBody,
    auth_info: &proto::AuthInfo,
    multi_sig: &proto::MultiSignature,
) -> String {
    let raw = proto::TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: auth_info.encode_to_vec(),
        signatures: vec![multi_sig.encode_to_vec()],
    };
    hex::encode(raw.encode_to_vec())
}

/// Extracts the send message from a transaction body.
pub fn decode_msg_send(body: &proto::TxBody) -> Result<proto::MsgSend> {
    let any = body
        .messages
        .first()
        .context("Transaction body has no messages")?;
    if any.type_url != proto::MSG_SEND_TYPE_URL {
        return Err(anyhow::anyhow!(
            "Unexpected message type: {}",
            any.type_url
        ));
    }
    proto::MsgSend::decode(any.value.as_slice()).context("Failed to decode MsgSend")
}

// ============================================================================
// SIGN BYTES
// ============================================================================

/// Legacy amino JSON sign bytes over the transaction content.
///
/// Amino JSON requires alphabetically sorted keys; the structs below declare
/// their fields in that order, which serde preserves.
pub fn amino_sign_bytes(
    chain_id: &str,
    account_number: u64,
    sequence: u64,
    fee: &proto::Fee,
    memo: &str,
    msg: &proto::MsgSend,
) -> Result<Vec<u8>> {
    #[derive(serde::Serialize)]
    struct StdCoin<'a> {
        amount: &'a str,
        denom: &'a str,
    }
    #[derive(serde::Serialize)]
    struct StdFee<'a> {
        amount: Vec<StdCoin<'a>>,
        gas: String,
    }
    #[derive(serde::Serialize)]
    struct StdMsgValue<'a> {
        amount: Vec<StdCoin<'a>>,
        from_address: &'a str,
        to_address: &'a str,
    }
    #[derive(serde::Serialize)]
    struct StdMsg<'a> {
        #[serde(rename = "type")]
        type_name: &'a str,
        value: StdMsgValue<'a>,
    }
    #[derive(serde::Serialize)]
    struct StdSignDoc<'a> {
        account_number: String,
        chain_id: &'a str,
        fee: StdFee<'a>,
        memo: &'a str,
        msgs: Vec<StdMsg<'a>>,
        sequence: String,
    }

    fn coins(amount: &[proto::Coin]) -> Vec<StdCoin<'_>> {
        amount
            .iter()
            .map(|c| StdCoin {
                amount: &c.amount,
                denom: &c.denom,
            })
            .collect()
    }

    let doc = StdSignDoc {
        account_number: account_number.to_string(),
        chain_id,
        fee: StdFee {
            amount: coins(&fee.amount),
            gas: fee.gas_limit.to_string(),
        },
        memo,
        msgs: vec![StdMsg {
            type_name: AMINO_MSG_SEND_TYPE,
            value: StdMsgValue {
                amount: coins(&msg.amount),
                from_address: &msg.from_address,
                to_address: &msg.to_address,
            },
        }],
        sequence: sequence.to_string(),
    };
    serde_json::to_vec(&doc).context("Failed to serialize sign doc")
}

// ============================================================================
// SIGNING
// ============================================================================

/// Builds or co-signs the return transaction with this validator's share.
///
/// When `existing_hex` is empty the transaction is built fresh from
/// `params`; otherwise it is decoded and the embedded sequence is reused so
/// all validators sign identical bytes. The signature lands at the slot the
/// canonical member ordering assigns, so any signing order converges on the
/// same fully-signed transaction.
pub async fn sign_return_tx(
    signer: &ValidatorSigner,
    multisig: &MultisigKey,
    existing_hex: &str,
    params: &ReturnTxParams,
) -> Result<SignedReturnTx> {
    let (body, mut auth_info, mut multi_sig) = if existing_hex.is_empty() {
        build_unsigned(multisig, params)?
    } else {
        decode_return_tx(existing_hex)?
    };

    let expected_key = multisig.to_any();
    let signer_info = auth_info
        .signer_infos
        .first_mut()
        .context("Transaction has no signer info")?;
    if signer_info.public_key.as_ref() != Some(&expected_key) {
        return Err(anyhow::anyhow!("Multisig is not the transaction signer"));
    }
    let sequence = signer_info.sequence;

    let my_key = signer.cosmos_public_key();
    let index = multisig
        .index_of(&my_key)
        .context("Signer is not a member of the multisig")?;

    let msg = decode_msg_send(&body)?;
    let fee = auth_info
        .fee
        .clone()
        .context("Transaction has no fee")?;

    let sign_bytes = amino_sign_bytes(
        &params.chain_id,
        params.account_number,
        sequence,
        &fee,
        &body.memo,
        &msg,
    )?;
    let signature = signer.cosmos_sign(&sign_bytes).await?;

    // Self-check before persisting anything
    let digest: [u8; 32] = Sha256::digest(&sign_bytes).into();
    let compact = k256::ecdsa::Signature::from_slice(&signature)
        .context("Signer produced a malformed signature")?;
    my_key
        .verifying_key()?
        .verify_prehash(&digest, &compact)
        .map_err(|_| anyhow::anyhow!("Signature failed self-verification"))?;

    let multi = match signer_info
        .mode_info
        .as_mut()
        .and_then(|m| m.sum.as_mut())
    {
        Some(proto::mode_info::Sum::Multi(multi)) => multi,
        _ => return Err(anyhow::anyhow!("Signer info is not a multisig mode")),
    };
    let bitarray = multi
        .bitarray
        .as_mut()
        .context("Multisig mode has no bit array")?;

    if bitarray_get(bitarray, index) {
        return Err(anyhow::anyhow!("Transaction already signed by this validator"));
    }
    let slot = bitarray_true_count_before(bitarray, index);
    bitarray_set(bitarray, index);
    multi.mode_infos.insert(
        slot,
        proto::ModeInfo {
            sum: Some(proto::mode_info::Sum::Single(proto::Single {
                mode: proto::SIGN_MODE_LEGACY_AMINO_JSON,
            })),
        },
    );
    multi_sig.signatures.insert(slot, signature.to_vec());
    let signature_count = multi_sig.signatures.len();

    Ok(SignedReturnTx {
        return_tx: encode_return_tx(&body, &auth_info, &multi_sig),
        signature_count,
    })
}
