//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Linkage: every append points at the tip it extended
//! - Reproducible hashing: recomputation matches the stored hash
//! - Validity: any chain built by appends verifies
//! - Tamper evidence: changing any single persisted field is detected

use proptest::prelude::*;
use reward_ledger::{
    storage::encode, Block, Config, Error, HashAlgorithm, IntegrityFailure, IntegrityReport,
    Ledger, GENESIS_SENTINEL,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use tempfile::TempDir;

/// Strategy for generating valid amounts (positive decimals)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for generating distinct sender/receiver pairs
fn parties_strategy() -> impl Strategy<Value = (String, String)> {
    ("[a-z]{3,8}", "[a-z]{3,8}").prop_filter("sender and receiver differ", |(s, r)| s != r)
}

fn transfer_strategy() -> impl Strategy<Value = (String, String, Decimal)> {
    (parties_strategy(), amount_strategy()).prop_map(|((s, r), a)| (s, r, a))
}

/// Create test ledger with temp directory
async fn create_test_ledger() -> (Ledger, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = Config::with_data_dir(temp_dir.path());
    (Ledger::initialize(config).await.unwrap(), temp_dir)
}

fn flip_hex_char(s: &str) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    chars[0] = if chars[0] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

/// Single-field edits applied to the JSON form of a block
#[derive(Debug, Clone, Copy)]
enum Tamper {
    Hash,
    PreviousHash,
    Index,
    CreatedAt,
    Amount,
    AmountScale,
    Sender,
}

fn tamper_strategy() -> impl Strategy<Value = Tamper> {
    prop_oneof![
        Just(Tamper::Hash),
        Just(Tamper::PreviousHash),
        Just(Tamper::Index),
        Just(Tamper::CreatedAt),
        Just(Tamper::Amount),
        Just(Tamper::AmountScale),
        Just(Tamper::Sender),
    ]
}

fn apply_tamper(block: &mut Value, tamper: Tamper) {
    match tamper {
        Tamper::Hash => {
            let flipped = flip_hex_char(block["hash"].as_str().unwrap());
            block["hash"] = Value::String(flipped);
        }
        Tamper::PreviousHash => {
            let flipped = flip_hex_char(block["previous_hash"].as_str().unwrap());
            block["previous_hash"] = Value::String(flipped);
        }
        Tamper::Index => {
            let index = block["index"].as_u64().unwrap();
            block["index"] = Value::from(index + 7);
        }
        Tamper::CreatedAt => {
            block["created_at"] = Value::String("1999-01-01T00:00:00Z".into());
        }
        Tamper::Amount => {
            // Above anything amount_strategy generates
            block["transactions"][0]["amount"] = Value::String("1000000.01".into());
        }
        Tamper::AmountScale => {
            // Same value, one more trailing zero
            let amount = block["transactions"][0]["amount"].as_str().unwrap();
            block["transactions"][0]["amount"] = Value::String(format!("{amount}0"));
        }
        Tamper::Sender => {
            block["transactions"][0]["sender"] = Value::String("MALLORY".into());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: every append links to the tip it extended and seals a
    /// reproducible hash; the finished chain verifies
    #[test]
    fn prop_appends_link_and_verify(transfers in prop::collection::vec(transfer_strategy(), 0..12)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _dir) = create_test_ledger().await;
            let algorithm = ledger.config().hash_algorithm;

            for (sender, receiver, amount) in &transfers {
                let tip_before = ledger.latest_block().unwrap();
                let block = ledger
                    .append_transaction(sender.as_str(), receiver.as_str(), *amount)
                    .await
                    .unwrap();

                prop_assert_eq!(block.previous_hash(), tip_before.hash());
                prop_assert_eq!(block.index(), tip_before.index() + 1);
                prop_assert_eq!(algorithm.hash_block(&block), block.hash());
            }

            prop_assert_eq!(ledger.len(), transfers.len() + 1);
            prop_assert_eq!(ledger.verify_integrity(), IntegrityReport::Valid);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: non-positive amounts are always rejected and leave the
    /// chain untouched
    #[test]
    fn prop_non_positive_amounts_rejected(cents in -1_000_000i64..=0) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _dir) = create_test_ledger().await;

            let result = ledger
                .append_transaction("treasury", "citizen", Decimal::new(cents, 2))
                .await;
            prop_assert!(matches!(result, Err(Error::Validation(_))));
            prop_assert_eq!(ledger.len(), 1);

            ledger.shutdown().await.unwrap();
            Ok(())
        })?;
    }

    /// Property: changing any single persisted field of any block makes
    /// verification fail at that block or later
    #[test]
    fn prop_single_field_tamper_detected(
        transfers in prop::collection::vec(transfer_strategy(), 1..6),
        position in any::<prop::sample::Index>(),
        tamper in tamper_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ledger, _dir) = create_test_ledger().await;
            for (sender, receiver, amount) in &transfers {
                ledger
                    .append_transaction(sender.as_str(), receiver.as_str(), *amount)
                    .await
                    .unwrap();
            }
            let chain = ledger.get_chain();
            ledger.shutdown().await.unwrap();

            // Genesis carries no transactions to edit
            let at = match tamper {
                Tamper::Amount | Tamper::AmountScale | Tamper::Sender => 1 + position.index(chain.len() - 1),
                _ => position.index(chain.len()),
            };

            let mut json = serde_json::to_value(&*chain).unwrap();
            apply_tamper(&mut json[at], tamper);
            let tampered: Vec<Block> = serde_json::from_value(json).unwrap();

            match reward_ledger::verify_integrity(HashAlgorithm::Sha256, &tampered) {
                IntegrityReport::Valid => prop_assert!(false, "tamper {:?} at {} went unnoticed", tamper, at),
                IntegrityReport::Invalid { at_index, .. } => prop_assert!(at_index >= at as u64),
            }
            Ok(())
        })?;
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_ledger_is_genesis_only() {
        let (ledger, _dir) = create_test_ledger().await;

        let chain = ledger.get_chain();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].index(), 0);
        assert_eq!(chain[0].previous_hash(), GENESIS_SENTINEL);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_single_append() {
        let (ledger, _dir) = create_test_ledger().await;

        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();

        let chain = ledger.get_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].previous_hash(), chain[0].hash());

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_concurrent_appends() {
        let (ledger, _dir) = create_test_ledger().await;
        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();

        let a = ledger.clone();
        let b = ledger.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.append_transaction("bob", "carol", Decimal::new(5, 0)).await }),
            tokio::spawn(async move { b.append_transaction("alice", "dan", Decimal::new(3, 0)).await }),
        );
        ra.unwrap().unwrap();
        rb.unwrap().unwrap();

        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.verify_integrity(), IntegrityReport::Valid);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_appends_never_fork() {
        const K: usize = 32;
        let (ledger, _dir) = create_test_ledger().await;

        let mut tasks = Vec::with_capacity(K);
        for i in 0..K {
            let ledger = ledger.clone();
            tasks.push(tokio::spawn(async move {
                ledger
                    .append_transaction("treasury", format!("citizen-{i}"), Decimal::new(5, 0))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let chain = ledger.get_chain();
        assert_eq!(chain.len(), K + 1);
        for (position, block) in chain.iter().enumerate() {
            assert_eq!(block.index(), position as u64);
        }
        let previous: HashSet<_> = chain.iter().map(|b| b.previous_hash()).collect();
        assert_eq!(previous.len(), chain.len());
        assert_eq!(ledger.verify_integrity(), IntegrityReport::Valid);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_tampered_hash_detected_after_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        let ledger = Ledger::initialize(config.clone()).await.unwrap();
        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();

        let path = config.ledger_path();
        let mut json: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let flipped = flip_hex_char(json["blocks"][1]["hash"].as_str().unwrap());
        json["blocks"][1]["hash"] = Value::String(flipped);
        fs::write(&path, serde_json::to_vec_pretty(&json).unwrap()).unwrap();

        let reloaded = Ledger::initialize(config).await.unwrap();
        assert_eq!(
            reloaded.verify_integrity(),
            IntegrityReport::Invalid {
                at_index: 1,
                reason: IntegrityFailure::HashMismatch
            }
        );
        reloaded.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_reproduces_chain_byte_for_byte() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        let ledger = Ledger::initialize(config.clone()).await.unwrap();
        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();
        ledger
            .append_transaction("treasury", "alice", Decimal::new(1250, 2))
            .await
            .unwrap();
        let before = ledger.get_chain();
        ledger.shutdown().await.unwrap();
        let on_disk = fs::read(config.ledger_path()).unwrap();

        let reloaded = Ledger::initialize(config).await.unwrap();
        let after = reloaded.get_chain();
        assert_eq!(*after, *before);
        assert_eq!(encode(HashAlgorithm::Sha256, &after).unwrap(), on_disk);

        reloaded.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back() {
        let (ledger, _dir) = create_test_ledger().await;
        let tmp = {
            let mut os = ledger.config().ledger_path().into_os_string();
            os.push(".tmp");
            std::path::PathBuf::from(os)
        };

        // A directory on the temp path makes the atomic write fail
        fs::create_dir(&tmp).unwrap();
        let err = ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.metrics().append_failures.get(), 1);

        // Once the store recovers, the next block reuses index 1
        fs::remove_dir(&tmp).unwrap();
        let block = ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();
        assert_eq!(block.index(), 1);
        assert_eq!(ledger.verify_integrity(), IntegrityReport::Valid);

        ledger.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_stored_transaction_refuses_to_start() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        let ledger = Ledger::initialize(config.clone()).await.unwrap();
        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();

        // Rejected while parsing, whatever the stored hashes say
        let path = config.ledger_path();
        let mut json: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        json["blocks"][1]["transactions"][0]["receiver"] = Value::String("alice".into());
        json["blocks"][1]["transactions"][0]["amount"] = Value::String("-50".into());
        let edited = serde_json::to_vec_pretty(&json).unwrap();
        fs::write(&path, &edited).unwrap();

        let err = Ledger::initialize(config.clone()).await.unwrap_err();
        assert!(err.is_persistence());
        assert!(err.to_string().contains("invalid transaction"));
        assert_eq!(fs::read(&path).unwrap(), edited);
    }

    #[tokio::test]
    async fn test_amount_scale_edit_detected_after_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(temp_dir.path());

        let ledger = Ledger::initialize(config.clone()).await.unwrap();
        ledger
            .append_transaction("alice", "bob", Decimal::new(10, 0))
            .await
            .unwrap();
        ledger.shutdown().await.unwrap();

        let path = config.ledger_path();
        let mut json: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["blocks"][1]["transactions"][0]["amount"], "10");
        json["blocks"][1]["transactions"][0]["amount"] = Value::String("10.000".into());
        fs::write(&path, serde_json::to_vec_pretty(&json).unwrap()).unwrap();

        let reloaded = Ledger::initialize(config).await.unwrap();
        assert_eq!(
            reloaded.verify_integrity(),
            IntegrityReport::Invalid {
                at_index: 1,
                reason: IntegrityFailure::HashMismatch
            }
        );
        reloaded.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_store_refuses_to_start() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(temp_dir.path());
        fs::write(config.ledger_path(), b"not a ledger").unwrap();

        let err = Ledger::initialize(config.clone()).await.unwrap_err();
        assert!(err.is_persistence());

        // No genesis was written over the operator's data
        assert_eq!(fs::read(config.ledger_path()).unwrap(), b"not a ledger");
    }
}
