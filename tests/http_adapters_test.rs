//! JSON-RPC ledger client and HTTP prover against mock servers

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use zklogin_session::{
    ledger::{LedgerClient, MoveCall, RpcLedgerClient},
    prover::HttpProver,
    session::MemorySessionStore,
    signing::decode_signature,
    AccountAddress, OrchestratorConfig, PendingTransaction, ProviderConfig, SessionOrchestrator,
    ZkLoginError,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message }
    }))
}

async fn mount_system_state(server: &MockServer) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "suix_getLatestSuiSystemState" })))
        .respond_with(rpc_result(json!({
            "epoch": "412",
            "epochStartTimestampMs": "4102444800000",
            "epochDurationMs": "86400000"
        })))
        .mount(server)
        .await;
}

fn address() -> AccountAddress {
    "0x7d20dcdb2bca4f508ea9613994683eb4e76e9c4ed371169677c1be02aaf0b58e"
        .parse()
        .unwrap()
}

#[tokio::test]
async fn test_latest_epoch() {
    let server = MockServer::start().await;
    mount_system_state(&server).await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    let info = client.latest_epoch().await.unwrap();
    assert_eq!(info.epoch, 412);
    assert_eq!(info.start_timestamp_ms, 4_102_444_800_000);
    assert_eq!(info.duration_ms, 86_400_000);
}

#[tokio::test]
async fn test_balance_uses_coin_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "suix_getBalance",
            "params": [address().as_str(), "0x2::sui::SUI"]
        })))
        .respond_with(rpc_result(json!({
            "coinType": "0x2::sui::SUI",
            "coinObjectCount": 2,
            "totalBalance": "1500000000",
            "lockedBalance": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    assert_eq!(client.balance(&address()).await.unwrap(), 1_500_000_000);
}

#[tokio::test]
async fn test_build_move_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "unsafe_moveCall" })))
        .respond_with(|request: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let params = &body["params"];
            assert_eq!(params[2], "robot_control");
            assert_eq!(params[3], "request_control");
            assert_eq!(params[5][1], 15);
            assert_eq!(params[7], "10000000");
            rpc_result(json!({ "txBytes": BASE64.encode(b"tx-data"), "gas": [], "inputObjects": [] }))
        })
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    let call = MoveCall::new("0x8c1d::robot_control::request_control")
        .unwrap()
        .arg("0x5f1e")
        .arg(15)
        .arg("0x6");
    let bytes = client.build_move_call(&address(), &call).await.unwrap();
    assert_eq!(bytes, b"tx-data");
}

#[tokio::test]
async fn test_execute_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "sui_executeTransactionBlock",
            "params": [BASE64.encode(b"tx"), ["sig"], { "showEffects": true }, "WaitForLocalExecution"]
        })))
        .respond_with(rpc_result(json!({
            "digest": "8Hr3xJ4pB",
            "effects": { "status": { "status": "success" } }
        })))
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    let receipt = client.execute(b"tx", "sig").await.unwrap();
    assert_eq!(receipt.digest, "8Hr3xJ4pB");
}

#[tokio::test]
async fn test_execute_move_abort_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_result(json!({
            "digest": "Fq9",
            "effects": { "status": {
                "status": "failure",
                "error": "MoveAbort(MoveLocation { module: ModuleId { address: 8c1d, name: Identifier(\"robot_control\") }, function: 3, instruction: 12, function_name: Some(\"move_forward\") }, 6) in command 0"
            } }
        })))
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    match client.execute(b"tx", "sig").await {
        Err(ZkLoginError::LedgerRejection(rejection)) => {
            assert_eq!(rejection.abort_code, Some(6));
            assert_eq!(rejection.reason(), "control session has expired");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_execute_rpc_error_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(rpc_error(-32002, "Invalid user signature: Groth16 proof verify failed"))
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    match client.execute(b"tx", "sig").await {
        Err(ZkLoginError::LedgerRejection(rejection)) => {
            assert_eq!(rejection.abort_code, None);
            assert!(rejection.message.contains("Groth16"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_failure_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = RpcLedgerClient::new(server.uri(), TIMEOUT).unwrap();
    let err = client.latest_epoch().await.unwrap_err();
    assert!(err.is_network());
}

#[tokio::test]
async fn test_full_flow_over_http() {
    let rpc = MockServer::start().await;
    mount_system_state(&rpc).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "unsafe_moveCall" })))
        .respond_with(rpc_result(json!({ "txBytes": BASE64.encode(b"built-tx") })))
        .mount(&rpc)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "sui_executeTransactionBlock" })))
        .respond_with(rpc_result(json!({
            "digest": "D1g35t",
            "effects": { "status": { "status": "success" } }
        })))
        .expect(1)
        .mount(&rpc)
        .await;

    let prover = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "maxEpoch": "422", "keyClaimName": "sub" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "proofPoints": {
                "a": ["11", "12", "1"],
                "b": [["13", "14"], ["15", "16"], ["1", "0"]],
                "c": ["17", "18", "1"]
            },
            "issBase64Details": { "value": "wiaXNzIjoiaHR0cHM6Ly9hY2NvdW50cy5nb29nbGUuY29tIiw", "indexMod4": 1 },
            "headerBase64": "eyJhbGciOiJSUzI1NiIsImtpZCI6IjEifQ"
        })))
        .expect(1)
        .mount(&prover)
        .await;

    let mut orchestrator = SessionOrchestrator::new(
        OrchestratorConfig {
            provider: ProviderConfig::google("client.apps.example"),
            ..OrchestratorConfig::default()
        },
        Arc::new(RpcLedgerClient::new(rpc.uri(), TIMEOUT).unwrap()),
        Arc::new(HttpProver::new(prover.uri(), TIMEOUT).unwrap()),
        Arc::new(MemorySessionStore::new()),
    );

    let redirect = orchestrator.begin_login().await.unwrap();
    assert_eq!(redirect.max_epoch, 422);

    let token = encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "iss": "https://accounts.google.com",
            "sub": "117912735658541336646",
            "aud": "client.apps.example",
            "nonce": redirect.nonce.as_str(),
        }),
        &EncodingKey::from_secret(b"secret"),
    )
    .unwrap();
    orchestrator.complete_login(&token).await.unwrap();

    let mut tx = PendingTransaction::new(
        MoveCall::new("0x8c1d::robot_control::end_session")
            .unwrap()
            .arg("0x5f1e")
            .arg("0x6"),
    );
    let receipt = orchestrator.sign(&mut tx).await.unwrap();
    assert_eq!(receipt.digest, "D1g35t");

    // The submitted signature carries the proof and the epoch bound
    let requests = rpc.received_requests().await.unwrap();
    let execute = requests
        .iter()
        .map(|r| serde_json::from_slice::<serde_json::Value>(&r.body).unwrap())
        .find(|body| body["method"] == "sui_executeTransactionBlock")
        .unwrap();
    let signature = execute["params"][1][0].as_str().unwrap();
    let decoded = decode_signature(signature).unwrap();
    assert_eq!(decoded.max_epoch, 422);
    assert_eq!(decoded.inputs.proof_points.a[0], "11");
}
