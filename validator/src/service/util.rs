//! Per-record helpers shared by the signing services.

use anyhow::Result;

use crate::eth::address::{is_zero_address, parse_address, to_checksum};
use crate::models::{MintMemo, Status};

/// Recomputes a record's status and confirmation count against the chain's
/// current height.
///
/// Confirmations parse leniently (junk and negatives clamp to zero), the
/// record height does not: an unparsable height is an error and the caller
/// skips the record for this tick.
pub fn update_status_and_confirmations(
    status: Status,
    confirmations: &str,
    height: &str,
    current_height: i64,
    required_confirmations: i64,
) -> Result<(Status, String)> {
    let mut confirmations: i64 = confirmations.parse().unwrap_or(0).max(0);
    let mut status = status;

    if status == Status::Pending || confirmations == 0 {
        status = Status::Pending;
        if required_confirmations == 0 {
            status = Status::Confirmed;
        } else {
            let record_height: i64 = height
                .parse()
                .map_err(|_| anyhow::anyhow!("Unparsable record height: {:?}", height))?;
            confirmations = current_height - record_height;
            if confirmations >= required_confirmations {
                status = Status::Confirmed;
            }
        }
    }

    Ok((status, confirmations.max(0).to_string()))
}

/// Validates a deposit memo against the configured EVM chain.
///
/// Valid iff the memo is JSON `{address, chain_id}`, the address equals its
/// EIP-55 normalization (case-insensitively, so a lowercase address is
/// fine), is not the zero address, and `chain_id` is the configured chain id
/// in strict decimal. Returns the normalized memo on success.
pub fn validate_memo(raw_memo: &str, eth_chain_id: u64) -> Option<MintMemo> {
    let memo: MintMemo = serde_json::from_str(raw_memo).ok()?;

    if !memo.address.starts_with("0x") {
        return None;
    }
    let address = parse_address(&memo.address).ok()?;
    if is_zero_address(&address) {
        return None;
    }
    let checksummed = to_checksum(&address);
    if !checksummed.eq_ignore_ascii_case(&memo.address) {
        return None;
    }

    let chain_id: u64 = memo.chain_id.parse().ok()?;
    if chain_id != eth_chain_id {
        return None;
    }

    Some(MintMemo {
        address: checksummed,
        chain_id: chain_id.to_string(),
    })
}

/// Current wall-clock time as a BSON timestamp.
pub fn now() -> bson::DateTime {
    bson::DateTime::from_chrono(chrono::Utc::now())
}

/// Splits an inclusive block range into ascending chunks no wider than
/// `max_blocks`, the bound a single log query may span.
pub fn chunk_ranges(start: u64, end: u64, max_blocks: u64) -> Vec<(u64, u64)> {
    if end <= start {
        return vec![];
    }
    if end - start <= max_blocks {
        return vec![(start, end)];
    }
    let mut ranges = Vec::new();
    let mut chunk_start = start;
    while chunk_start < end {
        let chunk_end = (chunk_start + max_blocks).min(end);
        ranges.push((chunk_start, chunk_end));
        chunk_start += max_blocks;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_ID: u64 = 5;

    #[test]
    fn accepts_checksummed_memo() {
        let memo = validate_memo(
            r#"{"address":"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed","chain_id":"5"}"#,
            CHAIN_ID,
        )
        .unwrap();
        assert_eq!(memo.address, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(memo.chain_id, "5");
    }

    #[test]
    fn normalizes_lowercase_address() {
        let memo = validate_memo(
            r#"{"address":"0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed","chain_id":"5"}"#,
            CHAIN_ID,
        )
        .unwrap();
        assert_eq!(memo.address, "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn rejects_non_json_memo() {
        assert!(validate_memo("not json", CHAIN_ID).is_none());
    }

    #[test]
    fn rejects_zero_address() {
        assert!(validate_memo(
            r#"{"address":"0x0000000000000000000000000000000000000000","chain_id":"5"}"#,
            CHAIN_ID,
        )
        .is_none());
    }

    #[test]
    fn rejects_wrong_or_hex_chain_id() {
        let memo = r#"{"address":"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed","chain_id":"1"}"#;
        assert!(validate_memo(memo, CHAIN_ID).is_none());
        // strict decimal: "0x5" is not 5
        let memo = r#"{"address":"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed","chain_id":"0x5"}"#;
        assert!(validate_memo(memo, CHAIN_ID).is_none());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(validate_memo(
            r#"{"address":"5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed","chain_id":"5"}"#,
            CHAIN_ID,
        )
        .is_none());
    }

    #[test]
    fn zero_required_confirmations_confirms_immediately() {
        let (status, confirmations) =
            update_status_and_confirmations(Status::Pending, "0", "100", 100, 0).unwrap();
        assert_eq!(status, Status::Confirmed);
        assert_eq!(confirmations, "0");
    }

    #[test]
    fn counts_confirmations_against_height() {
        let (status, confirmations) =
            update_status_and_confirmations(Status::Pending, "0", "100", 105, 10).unwrap();
        assert_eq!(status, Status::Pending);
        assert_eq!(confirmations, "5");

        let (status, confirmations) =
            update_status_and_confirmations(Status::Pending, "0", "100", 110, 10).unwrap();
        assert_eq!(status, Status::Confirmed);
        assert_eq!(confirmations, "10");
    }

    #[test]
    fn clamps_junk_confirmations_to_zero() {
        let (_, confirmations) =
            update_status_and_confirmations(Status::Pending, "-1", "100", 100, 10).unwrap();
        assert_eq!(confirmations, "0");
        let (_, confirmations) =
            update_status_and_confirmations(Status::Pending, "junk", "100", 100, 10).unwrap();
        assert_eq!(confirmations, "0");
    }

    #[test]
    fn unparsable_height_is_an_error() {
        assert!(
            update_status_and_confirmations(Status::Pending, "0", "junk", 100, 10).is_err()
        );
    }

    #[test]
    fn chunks_block_ranges_in_ascending_order() {
        assert_eq!(
            chunk_ranges(0, 250_000, 100_000),
            vec![(0, 100_000), (100_000, 200_000), (200_000, 250_000)]
        );
        assert_eq!(chunk_ranges(10, 20, 100_000), vec![(10, 20)]);
        assert_eq!(chunk_ranges(20, 20, 100_000), Vec::<(u64, u64)>::new());
    }

    #[test]
    fn confirmed_records_stay_confirmed() {
        let (status, confirmations) =
            update_status_and_confirmations(Status::Confirmed, "12", "100", 90, 10).unwrap();
        assert_eq!(status, Status::Confirmed);
        assert_eq!(confirmations, "12");
    }
}
