use serde_json::json;
use solana_domain_indexer::config::DEFAULT_PROGRAM_ID;
use solana_domain_indexer::types::TransactionEncoding;
use solana_domain_indexer::utils::rpc::{DefaultRpcProvider, RpcProvider};
use solana_domain_indexer::{CommitmentLevel, Fetcher};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SIGNATURE: &str =
    "5j7s6NiJS3JAkvgkoc18WVAsiSaci2pxB2A6ueCJP4tprA2TFg9wSyTLeYouxPBJEMzJinENTkpA52YStRW5Dia7";
const OLDER_SIGNATURE: &str =
    "2LSFccEnZXeFy3SqjnGGNBBwErsghTZxGei4BgrSuunaSmXFCkUDLBavEih4rGXMvXLjnwtz6ZgcNA8LgtYPCvDb";
const OWNER: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

/// Mock version call which RpcClient may make
async fn mount_version(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_string_contains("getVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": { "solana-core": "1.18.0", "feature-set": 0 },
            "id": 1
        })))
        .mount(server)
        .await;
}

fn transaction_body(version: serde_json::Value) -> serde_json::Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "slot": 123456,
            "blockTime": 1678888888,
            "version": version,
            "transaction": {
                "signatures": [SIGNATURE],
                "message": {
                    "header": {
                        "numRequiredSignatures": 1,
                        "numReadonlySignedAccounts": 0,
                        "numReadonlyUnsignedAccounts": 2
                    },
                    "accountKeys": [
                        DEFAULT_PROGRAM_ID,
                        "11111111111111111111111111111111",
                        OWNER
                    ],
                    "instructions": [],
                    "recentBlockhash": "11111111111111111111111111111111"
                }
            },
            "meta": {
                "err": null,
                "status": { "Ok": null },
                "fee": 5000,
                "preBalances": [100000, 1, 0],
                "postBalances": [95000, 1, 0],
                "innerInstructions": [],
                "logMessages": [
                    format!("Program {DEFAULT_PROGRAM_ID} invoke [1]"),
                    "Program log: Buying domain Alice.skr",
                    format!("Program {DEFAULT_PROGRAM_ID} success")
                ],
                "preTokenBalances": [],
                "postTokenBalances": [],
                "rewards": []
            }
        },
        "id": 1
    })
}

#[tokio::test]
async fn test_get_signatures_maps_status_entries() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("getSignaturesForAddress"))
        .and(body_string_contains(OLDER_SIGNATURE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": [
                {
                    "signature": SIGNATURE,
                    "slot": 200,
                    "err": null,
                    "memo": null,
                    "blockTime": 1678888888,
                    "confirmationStatus": "confirmed"
                },
                {
                    "signature": "failed-one",
                    "slot": 199,
                    "err": { "InstructionError": [0, { "Custom": 6000 }] },
                    "memo": null,
                    "blockTime": null,
                    "confirmationStatus": "confirmed"
                }
            ],
            "id": 1
        })))
        .mount(&server)
        .await;

    let provider = DefaultRpcProvider::new(&server.uri());
    let program = Pubkey::from_str(DEFAULT_PROGRAM_ID).unwrap();
    let page = provider
        .get_signatures(&program, Some(OLDER_SIGNATURE), 10)
        .await
        .unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].signature, SIGNATURE);
    assert_eq!(page[0].slot, 200);
    assert_eq!(page[0].block_time, Some(1678888888));
    assert!(!page[0].failed);
    assert!(page[1].failed);
    assert_eq!(page[1].block_time, None);
}

#[tokio::test]
async fn test_invalid_cursor_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    let provider = DefaultRpcProvider::new(&server.uri());
    let program = Pubkey::from_str(DEFAULT_PROGRAM_ID).unwrap();

    let result = provider.get_signatures(&program, Some("not-a-signature"), 10).await;

    assert!(result.is_err());
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_get_transaction_projects_logs_and_keys() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("getTransaction"))
        .and(body_string_contains("maxSupportedTransactionVersion"))
        .respond_with(ResponseTemplate::new(200).set_body_json(transaction_body(json!(0))))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&server.uri(), CommitmentLevel::Confirmed);
    let tx = fetcher
        .fetch_transaction(SIGNATURE)
        .await
        .unwrap()
        .expect("transaction should be found");

    assert_eq!(tx.signature, SIGNATURE);
    assert_eq!(tx.slot, 123456);
    assert_eq!(tx.block_time, Some(1678888888));
    assert_eq!(tx.fee, 5000);
    assert_eq!(tx.encoding, TransactionEncoding::Versioned);
    assert_eq!(tx.account_keys[2], OWNER);
    assert!(!tx.failed);
    assert_eq!(tx.logs.as_ref().map(Vec::len), Some(3));
    assert_eq!(tx.raw["slot"], 123456);
}

#[tokio::test]
async fn test_missing_transaction_is_none() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("getTransaction"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": null,
            "id": 1
        })))
        .mount(&server)
        .await;

    let provider = DefaultRpcProvider::new(&server.uri());
    assert!(provider.get_transaction(SIGNATURE).await.unwrap().is_none());
}

#[tokio::test]
async fn test_http_failure_is_transient_per_signature() {
    let server = MockServer::start().await;
    mount_version(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("getTransaction"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let fetcher = Fetcher::new(&server.uri(), CommitmentLevel::Confirmed);
    let results = fetcher
        .fetch_transactions(&[SIGNATURE.to_string(), OLDER_SIGNATURE.to_string()])
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, SIGNATURE);
    assert_eq!(results[1].0, OLDER_SIGNATURE);
    for (_, result) in results {
        let err = result.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
