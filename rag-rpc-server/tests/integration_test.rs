/// Integration tests for the JSON-RPC server
///
/// These tests require a running server on port 7879, e.g.:
///   rag-rpc-server --mock
///
/// To run: cargo test --package rag-rpc-server --test integration_test -- --ignored --nocapture
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

fn round_trip(request: &Value) -> Value {
    let mut stream = TcpStream::connect("127.0.0.1:7879")
        .expect("Failed to connect to server. Is it running?");
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .unwrap();

    let request_json = serde_json::to_string(request).unwrap();
    stream.write_all(request_json.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
    stream.flush().unwrap();

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).unwrap();

    println!("Response: {}", response_line);
    serde_json::from_str(&response_line).unwrap()
}

#[test]
#[ignore] // Requires a running server
fn test_jsonrpc_query() {
    let response = round_trip(&json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "rag.query",
        "params": {
            "query": "What's the current price of Bitcoin?",
            "top_k": 3
        }
    }));

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);

    if response.get("error").is_some() {
        println!("Error response: {}", response["error"]);
        // Live backends may be down; that must surface as upstream unavailable
        assert_eq!(response["error"]["code"], -32003);
    } else {
        let result = &response["result"];
        assert!(result["answer"].as_str().unwrap().contains("Bitcoin"));
        assert!(result.get("metadata").is_some());

        println!(
            "Query duration: {}ms",
            result["metadata"]["query_duration_ms"]
        );
    }
}

#[test]
#[ignore]
fn test_jsonrpc_batch() {
    let response = round_trip(&json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "rag.batch",
        "params": {
            "queries": ["Tell me about Ethereum", "", "Is Solana growing?"]
        }
    }));

    let entries = response["result"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["query"], "Tell me about Ethereum");
    assert_eq!(entries[1]["status"], "failed");
    assert_eq!(entries[2]["query"], "Is Solana growing?");
}

#[test]
#[ignore]
fn test_jsonrpc_invalid_method() {
    let response = round_trip(&json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "invalid.method",
        "params": {}
    }));

    assert!(response.get("error").is_some());
    assert_eq!(response["error"]["code"], -32601); // METHOD_NOT_FOUND
}

#[test]
#[ignore]
fn test_jsonrpc_invalid_params() {
    let response = round_trip(&json!({
        "jsonrpc": "2.0",
        "id": 4,
        "method": "rag.query",
        "params": {
            "invalid": "params"
        }
    }));

    assert!(response.get("error").is_some());
    assert_eq!(response["error"]["code"], -32602); // INVALID_PARAMS
}

#[test]
#[ignore]
fn test_jsonrpc_empty_query() {
    let response = round_trip(&json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "rag.query",
        "params": {"query": "   "}
    }));

    assert_eq!(response["error"]["code"], -32001); // MALFORMED_QUERY
}
