//! End-to-end smoke test for animica-node.
//!
//! Starts a real node process with a fresh genesis, submits a signed
//! transfer via JSON-RPC, stores a DA blob, and asserts the state and
//! receipts reflect it all.
//!
//! Run with:
//!   cargo test -p animica-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use animica_core::amount::Amount;
use animica_crypto::{KeyPair, SigScheme};
use animica_genesis::{Allocation, NetworkParams};
use animica_tx::{encode_envelope, SignedTx, TxBody, TxKind};
use base64::Engine as _;

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "chain.getChainId",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

async fn get_balance(client: &reqwest::Client, url: &str, address: &str) -> u128 {
    let result = rpc_call(client, url, "state.getBalance", serde_json::json!([address])).await;
    result.as_str().unwrap().parse().expect("parse balance")
}

async fn wait_for_receipt(
    client: &reqwest::Client,
    url: &str,
    tx_hash: &str,
    timeout: Duration,
) -> serde_json::Value {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        let result = rpc_call(
            client,
            url,
            "tx.getTransactionReceipt",
            serde_json::json!([tx_hash]),
        )
        .await;
        if !result.is_null() {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    panic!("no receipt for {tx_hash} within {timeout:?}");
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_transfer_and_blob() {
    // ── 1. Temp dir, faucet keypair, params file ─────────────────────────────
    let data_dir = std::env::temp_dir().join(format!("animica_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let faucet = KeyPair::generate(SigScheme::Dilithium3);
    let mut params = NetworkParams::devnet();
    params.allocations = vec![Allocation {
        address: faucet.address.to_bech32m(),
        amount: Amount::from_dec_str("1000000000000").unwrap(),
    }];
    let params_path = data_dir.join("network-params.json");
    std::fs::write(&params_path, serde_json::to_string(&params).unwrap()).unwrap();

    // ── 2. Start node ─────────────────────────────────────────────────────────
    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{rpc_port}");

    let node_bin = env!("CARGO_BIN_EXE_animica-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",
            data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",
            &format!("127.0.0.1:{rpc_port}"),
            "--network-params",
            params_path.to_str().unwrap(),
            "--seal-interval-ms",
            "300",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn animica-node");
    let _guard = NodeGuard { child, data_dir };

    // ── 3. Wait for RPC ready ─────────────────────────────────────────────────
    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
        "animica-node did not become ready within 20 seconds"
    );
    let chain_id = rpc_call(&http, &rpc_url, "chain.getChainId", serde_json::json!([])).await;
    assert_eq!(chain_id.as_u64().unwrap(), 1);

    // ── 4. Genesis balance ────────────────────────────────────────────────────
    let faucet_addr = faucet.address.to_bech32m();
    assert_eq!(get_balance(&http, &rpc_url, &faucet_addr).await, 1_000_000_000_000);

    // ── 5. Signed transfer faucet → bob ───────────────────────────────────────
    let bob = KeyPair::generate(SigScheme::Dilithium3);
    let body = TxBody {
        chain_id: 1,
        from: faucet.address,
        nonce: 0,
        gas_limit: 21_000,
        max_fee: Amount::from_dec_str("1000").unwrap(),
        memo: None,
        kind: TxKind::Transfer {
            to: bob.address,
            value: Amount::from_dec_str("1000").unwrap(),
        },
    };
    let signed = SignedTx::create(body, faucet.scheme, faucet.public_key.clone(), |msg| {
        faucet.sign(msg).expect("sign")
    });
    let raw_hex = format!("0x{}", hex::encode(encode_envelope(&signed)));

    let tx_hash = rpc_call(
        &http,
        &rpc_url,
        "tx.sendRawTransaction",
        serde_json::json!([raw_hex]),
    )
    .await;
    let tx_hash = tx_hash.as_str().unwrap().to_string();
    assert_eq!(tx_hash, format!("0x{}", signed.tx_hash.to_hex()));

    // ── 6. Receipt and balances ───────────────────────────────────────────────
    let receipt = wait_for_receipt(&http, &rpc_url, &tx_hash, Duration::from_secs(10)).await;
    assert_eq!(receipt["status"], "success");
    assert_eq!(receipt["gasUsed"].as_u64().unwrap(), 21_000);

    assert_eq!(get_balance(&http, &rpc_url, &bob.address.to_bech32m()).await, 1_000);
    // 1000 value + 1000 flat fee.
    assert_eq!(
        get_balance(&http, &rpc_url, &faucet_addr).await,
        1_000_000_000_000 - 2_000
    );

    // Duplicate submission is rejected.
    let dup = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "tx.sendRawTransaction",
        "params": [raw_hex],
        "id": 2
    });
    let resp: serde_json::Value = http
        .post(&rpc_url)
        .json(&dup)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["error"]["code"].as_i64().unwrap(), -32016);

    // ── 7. DA blob round-trip ─────────────────────────────────────────────────
    let blob_data: Vec<u8> = (0..5_000u32).map(|i| (i % 251) as u8).collect();
    let put = rpc_call(
        &http,
        &rpc_url,
        "da.putBlob",
        serde_json::json!([
            "0000000000000018",
            base64::engine::general_purpose::STANDARD.encode(&blob_data)
        ]),
    )
    .await;
    assert_eq!(put["size"].as_u64().unwrap(), 5_000);
    let commitment = put["commitment"].as_str().unwrap().to_string();

    let blob = rpc_call(&http, &rpc_url, "da.getBlob", serde_json::json!([commitment])).await;
    let roundtrip = base64::engine::general_purpose::STANDARD
        .decode(blob["dataB64"].as_str().unwrap())
        .unwrap();
    assert_eq!(roundtrip, blob_data);

    let proof = rpc_call(
        &http,
        &rpc_url,
        "da.getProof",
        serde_json::json!([commitment, 8]),
    )
    .await;
    assert_eq!(proof["samples"].as_array().unwrap().len(), 8);

    // ── 8. Chain advanced and the beacon answers ──────────────────────────────
    let head = rpc_call(&http, &rpc_url, "chain.getHead", serde_json::json!([])).await;
    assert!(head["height"].as_u64().unwrap() >= 1);
    let round = rpc_call(&http, &rpc_url, "rand.getRound", serde_json::json!([])).await;
    assert!(round["round"].as_u64().is_some());
}
