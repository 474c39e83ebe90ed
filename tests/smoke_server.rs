// Spawns the compiled server binary and drives it over a real TCP socket,
// speaking the `\r\n\r\n`-framed line protocol end to end.
use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use diploma_chain::crypto::{keys, pss};
use diploma_chain::crypto::hash::hash_sha256_hex;

static PORT_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_port() -> u16 {
    let offset = PORT_COUNTER.fetch_add(1, Ordering::SeqCst);
    // Spread test ports out to avoid collisions between parallel test threads.
    40100 + (offset as u16) * 3
}

struct KillOnDrop(Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_server(port: u16, data_dir: &std::path::Path) -> KillOnDrop {
    let child = Command::new(env!("CARGO_BIN_EXE_diploma-chaind"))
        .env("DIPLOMA_CHAIN_BIND", format!("127.0.0.1:{port}"))
        .env("DIPLOMA_CHAIN_DATA_DIR", data_dir)
        .env("DIPLOMA_CHAIN_DIFFICULTY", "1")
        .env("DIPLOMA_CHAIN_RANGE_SIZE", "100000")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn diploma-chaind");
    KillOnDrop(child)
}

fn wait_for_port(port: u16) {
    for _ in 0..100 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("server never came up on port {port}");
}

fn send_request(port: u16, request: &str) -> String {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
    stream.write_all(request.as_bytes()).expect("write");

    let mut response = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).expect("read");
        if n == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..n]);
        if response.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(response).expect("utf8 response")
}

fn diploma_json(signature: &str) -> serde_json::Value {
    serde_json::json!({
        "institution": "State University",
        "full_name": "Ada Lovelace",
        "program": "Computer Science",
        "qualification": "Bachelor",
        "specialty": "Software Engineering",
        "issue_date": "2026-06-01",
        "reg_number": "2026-BY-0001",
        "rector_name": "I. Ivanov",
        "secretary_name": "M. Petrova",
    })
}

fn canonical_bytes_for_signing(fields: &serde_json::Value) -> Vec<u8> {
    let order = [
        "institution", "full_name", "program", "qualification", "specialty",
        "issue_date", "reg_number", "rector_name", "secretary_name",
    ];
    let mut out = String::from("{");
    for (i, key) in order.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::to_string(key).unwrap());
        out.push(':');
        out.push_str(&serde_json::to_string(fields[key].as_str().unwrap()).unwrap());
    }
    out.push('}');
    out.into_bytes()
}

/// Mines a nonce client-side exactly as a miner would: hash `info ‖ nonce ‖
/// difficulty` until the result has `difficulty` leading hex zeros.
fn mine_nonce(info: &str, nonce_start: u64, difficulty: u32) -> (u64, String) {
    let mut nonce = nonce_start;
    loop {
        let candidate = format!("{info}{nonce}{difficulty}");
        let hash = hash_sha256_hex(candidate.as_bytes());
        if hash.as_bytes()[..difficulty as usize].iter().all(|&b| b == b'0') {
            return (nonce, hash);
        }
        nonce += 1;
    }
}

fn write_users_json(dir: &std::path::Path) {
    let admin_hash = bcrypt::hash("adminpass", 4).unwrap();
    let miner_hash = bcrypt::hash("minerpass", 4).unwrap();
    let json = serde_json::json!([
        { "username": "admin", "hashed_password": admin_hash, "role": "admin", "status": "active" },
        { "username": "miner", "hashed_password": miner_hash, "role": "miner", "status": "active" },
    ]);
    std::fs::write(dir.join("users.json"), serde_json::to_string_pretty(&json).unwrap()).unwrap();
}

#[test]
fn viewer_reads_genesis_block_anonymously() {
    let data_dir = tempfile::tempdir().unwrap();
    let port = unique_port();
    let _server = spawn_server(port, data_dir.path());
    wait_for_port(port);

    let response = send_request(port, "VIEW_BLOCK 0\r\n\r\n");
    assert!(response.starts_with("OK VIEW_BLOCK\r\n"));
    assert!(response.contains("\"data\""));
}

#[test]
fn add_block_without_login_is_rejected() {
    let data_dir = tempfile::tempdir().unwrap();
    let port = unique_port();
    let _server = spawn_server(port, data_dir.path());
    wait_for_port(port);

    let response = send_request(port, "ADD_BLOCK {}\r\n\r\n");
    assert!(response.starts_with("ERROR 401"));
}

#[test]
fn admin_add_then_miner_solve_end_to_end() {
    let data_dir = tempfile::tempdir().unwrap();
    write_users_json(data_dir.path());
    let port = unique_port();
    let _server = spawn_server(port, data_dir.path());
    wait_for_port(port);

    let (sk, pk) = keys::generate_keypair().unwrap();
    let pk_pem = keys::public_key_to_pem(&pk).unwrap();
    let fields = diploma_json("");
    let signature = pss::sign(&sk, &canonical_bytes_for_signing(&fields)).unwrap();

    let add_block_payload = serde_json::json!({
        "diploma_data": fields,
        "public_key": pk_pem,
        "signature": signature,
    });
    let add_request = format!("LOGIN admin adminpass\r\nADD_BLOCK {}\r\n\r\n", add_block_payload);
    let add_response = send_request(port, &add_request);
    assert!(add_response.contains("OK ADD_BLOCK"), "unexpected response: {add_response}");

    let mine_response = send_request(port, "LOGIN miner minerpass\r\nMINE\r\n\r\n");
    assert!(mine_response.contains("OK MINE"), "unexpected response: {mine_response}");

    let json_start = mine_response.find('{').unwrap();
    let parsed: serde_json::Value = serde_json::from_str(mine_response[json_start..].trim_end()).unwrap();
    let data = &parsed["data"];
    let info = data["info"].as_str().unwrap();
    let nonce_start = data["nonce_start"].as_u64().unwrap();
    let difficulty = data["difficulty"].as_u64().unwrap() as u32;

    let (nonce, hash) = mine_nonce(info, nonce_start, difficulty);

    let submit_request = format!("LOGIN miner minerpass\r\nSUBMIT_SOLUTION {nonce} {hash}\r\n\r\n");
    let submit_response = send_request(port, &submit_request);
    assert!(submit_response.contains("OK SUBMIT_SOLUTION"), "unexpected response: {submit_response}");
    assert!(submit_response.contains("\"reward\":1"));
}
