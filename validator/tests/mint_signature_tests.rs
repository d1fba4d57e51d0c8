//! EIP-712 mint authorization: digests, signature ordering, convergence.

#[path = "helpers.rs"]
mod helpers;

use pokt_validator::eth::address::to_checksum;
use pokt_validator::eth::eip712::{
    mint_digest, recover_signer, sort_signers_and_signatures,
};
use pokt_validator::eth::parse_address;
use pokt_validator::signer::ValidatorSigner;

use helpers::validator_signer;

const CHAIN_ID: u64 = 5;

fn controller() -> [u8; 20] {
    parse_address("0x1111111111111111111111111111111111111111").unwrap()
}

fn recipient() -> [u8; 20] {
    parse_address("0xCaFe000000000000000000000000000000000001".to_lowercase().as_str()).unwrap()
}

async fn append_signature(
    signer: &ValidatorSigner,
    digest: &[u8; 32],
    signers: &mut Vec<String>,
    signatures: &mut Vec<String>,
) {
    let signature = signer.eth_sign(digest).await.unwrap();
    signatures.push(format!("0x{}", hex::encode(signature)));
    signers.push(to_checksum(&signer.eth_address()));
    let (sorted_signers, sorted_signatures) =
        sort_signers_and_signatures(signers, signatures).unwrap();
    *signers = sorted_signers;
    *signatures = sorted_signatures;
}

#[tokio::test]
async fn validators_converge_on_identical_signature_arrays() {
    let s1 = validator_signer(1);
    let s2 = validator_signer(2);
    let s3 = validator_signer(3);
    let digest = mint_digest(CHAIN_ID, &controller(), &recipient(), 1_000_000, 1);

    let mut signers_a = Vec::new();
    let mut signatures_a = Vec::new();
    for signer in [&s1, &s2, &s3] {
        append_signature(signer, &digest, &mut signers_a, &mut signatures_a).await;
    }

    let mut signers_b = Vec::new();
    let mut signatures_b = Vec::new();
    for signer in [&s3, &s1, &s2] {
        append_signature(signer, &digest, &mut signers_b, &mut signatures_b).await;
    }

    // arrival order does not matter
    assert_eq!(signers_a, signers_b);
    assert_eq!(signatures_a, signatures_b);

    // signers are sorted by numeric address value
    let mut expected = signers_a.clone();
    expected.sort_by_key(|address| parse_address(address).unwrap());
    assert_eq!(signers_a, expected);
}

#[tokio::test]
async fn every_signature_verifies_against_its_signer() {
    let s1 = validator_signer(4);
    let s2 = validator_signer(5);
    let digest = mint_digest(CHAIN_ID, &controller(), &recipient(), 42, 7);

    let mut signers = Vec::new();
    let mut signatures = Vec::new();
    for signer in [&s1, &s2] {
        append_signature(signer, &digest, &mut signers, &mut signatures).await;
    }

    for (signer, signature) in signers.iter().zip(&signatures) {
        let raw = hex::decode(signature.trim_start_matches("0x")).unwrap();
        assert_eq!(recover_signer(&digest, &raw).unwrap(), *signer);
    }
}
