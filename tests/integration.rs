//! End-to-end tests for the corpus runner
//!
//! These tests start small TCP servers on loopback and verify:
//! 1. Corpus replay against echoing, answering and silent servers
//! 2. Failure isolation when nothing is listening
//! 3. The `run` and `send` commands of the built binary

use std::fs;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener as StdListener};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use corpus_runner::{corpus, runner, Endpoint, Outcome, Payload, RunOptions};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Server that reads to EOF, writes everything back, then closes
async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut data = Vec::new();
                if stream.read_to_end(&mut data).await.is_ok() {
                    let _ = stream.write_all(&data).await;
                    let _ = stream.shutdown().await;
                }
            });
        }
    });
    addr
}

/// Server that accepts connections and never answers
async fn spawn_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
            });
        }
    });
    addr
}

/// Blocking server that answers each CRLF-terminated request and closes
fn spawn_line_server() -> SocketAddr {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let reply = if request.starts_with(b"stats") {
                b"OK 5\r\nup\r\n".to_vec()
            } else {
                b"UNKNOWN_COMMAND\r\n".to_vec()
            };
            let _ = stream.write_all(&reply);
        }
    });
    addr
}

/// A port nothing is listening on
fn closed_port() -> u16 {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port()).unwrap()
}

fn write_corpus(files: &[(&str, &[u8])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, bytes) in files {
        fs::write(dir.path().join(name), bytes).unwrap();
    }
    dir
}

fn quick(half_close: bool) -> RunOptions {
    RunOptions {
        connect_timeout: Duration::from_secs(2),
        read_timeout: Duration::from_millis(300),
        write_timeout: Duration::from_secs(2),
        per_payload_connection: true,
        half_close,
    }
}

#[tokio::test]
async fn test_echo_round_trip() {
    let addr = spawn_echo_server().await;
    let dir = write_corpus(&[
        ("put.txt", &b"put 0 0 1 1\r\nA\r\n"[..]),
        ("peek.txt", &b"peek 1\r\n"[..]),
        ("binary.bin", &[0u8, 159, 146, 150, b'\r', b'\n'][..]),
    ]);
    let payloads = corpus::load(dir.path()).unwrap();

    let results = runner::run(&endpoint(addr), &payloads, &quick(true)).await;

    let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["binary", "peek", "put"]);
    for result in &results {
        assert_eq!(result.outcome, Outcome::Ok, "{}: {:?}", result.name, result.error);
        assert_eq!(result.received, result.sent);
    }
}

#[tokio::test]
async fn test_replay_is_idempotent() {
    let addr = spawn_echo_server().await;
    let payloads = vec![
        Payload::new("use", b"use tube\r\n".to_vec()),
        Payload::new("watch", b"watch tube\r\n".to_vec()),
    ];

    let first = runner::run(&endpoint(addr), &payloads, &quick(true)).await;
    let second = runner::run(&endpoint(addr), &payloads, &quick(true)).await;

    let received = |results: &[corpus_runner::RunResult]| -> Vec<Vec<u8>> {
        results.iter().map(|r| r.received.clone()).collect()
    };
    assert_eq!(received(&first), received(&second));
}

#[tokio::test]
async fn test_request_response_without_half_close() {
    let addr = spawn_line_server();
    let payloads = vec![
        Payload::new("stats", b"stats\r\n".to_vec()),
        Payload::new("bogus", b"nont10knowncommand\r\n".to_vec()),
    ];

    let results = runner::run(&endpoint(addr), &payloads, &quick(false)).await;

    assert_eq!(results[0].outcome, Outcome::Ok);
    assert_eq!(results[0].received, b"OK 5\r\nup\r\n");
    assert_eq!(results[1].outcome, Outcome::Ok);
    assert_eq!(results[1].received, b"UNKNOWN_COMMAND\r\n");
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let addr = spawn_silent_server().await;
    let payloads = vec![Payload::new("reserve", b"reserve\r\n".to_vec())];
    let options = quick(false);

    let started = Instant::now();
    let results = runner::run(&endpoint(addr), &payloads, &options).await;
    let elapsed = started.elapsed();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, Outcome::Timeout);
    assert!(results[0].received.is_empty());
    assert!(elapsed >= options.read_timeout);
    assert!(elapsed < options.read_timeout + Duration::from_secs(1));
}

#[tokio::test]
async fn test_nothing_listening_keeps_every_result() {
    let port = closed_port();
    let payloads = vec![
        Payload::new("a", b"a\r\n".to_vec()),
        Payload::new("b", b"b\r\n".to_vec()),
        Payload::new("c", b"c\r\n".to_vec()),
    ];

    let results = runner::run(
        &Endpoint::new("127.0.0.1", port).unwrap(),
        &payloads,
        &quick(false),
    )
    .await;

    assert_eq!(results.len(), 3);
    for (result, payload) in results.iter().zip(&payloads) {
        assert_eq!(result.name, payload.name());
        assert_eq!(result.outcome, Outcome::IoError);
        assert!(result.error.is_some());
    }
}

#[tokio::test]
async fn test_reused_connection_against_closing_server() {
    let addr = spawn_line_server();
    let payloads = vec![
        Payload::new("a", b"stats\r\n".to_vec()),
        Payload::new("b", b"stats\r\n".to_vec()),
    ];
    let options = RunOptions {
        per_payload_connection: false,
        ..quick(false)
    };

    let results = runner::run(&endpoint(addr), &payloads, &options).await;

    assert_eq!(results[0].outcome, Outcome::Ok);
    assert_eq!(results[1].outcome, Outcome::ConnectionClosedEarly);
}

// === Binary tests ===

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_corpus-runner"))
}

/// Empty config file so the user's own config never leaks into a test
fn empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "").unwrap();
    path
}

#[test]
fn test_cli_run_writes_responses() {
    let addr = spawn_line_server();
    let corpus = write_corpus(&[
        ("stats.txt", &b"stats\r\n"[..]),
        ("bogus.txt", &b"bogus\r\n"[..]),
    ]);
    let work = tempfile::tempdir().unwrap();
    let out = work.path().join("responses");

    let output = Command::new(binary())
        .arg("--config")
        .arg(empty_config(work.path()))
        .args(["run", "127.0.0.1", &addr.port().to_string()])
        .arg(corpus.path())
        .arg("--output")
        .arg(&out)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(fs::read(out.join("stats.out")).unwrap(), b"OK 5\r\nup\r\n");
    assert_eq!(fs::read(out.join("bogus.out")).unwrap(), b"UNKNOWN_COMMAND\r\n");

    let summary: serde_json::Value =
        serde_json::from_slice(&fs::read(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary[0]["name"], "bogus");
    assert_eq!(summary[1]["name"], "stats");
}

#[test]
fn test_cli_run_fails_when_payloads_fail() {
    let corpus = write_corpus(&[("stats.txt", &b"stats\r\n"[..])]);
    let work = tempfile::tempdir().unwrap();

    let output = Command::new(binary())
        .arg("--config")
        .arg(empty_config(work.path()))
        .args(["run", "127.0.0.1", &closed_port().to_string()])
        .arg(corpus.path())
        .args(["--connect-timeout-ms", "500"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 1 payloads"));
}

#[test]
fn test_cli_missing_corpus() {
    let work = tempfile::tempdir().unwrap();

    let output = Command::new(binary())
        .arg("--config")
        .arg(empty_config(work.path()))
        .args(["run", "127.0.0.1", "11300"])
        .arg(work.path().join("no-such-corpus"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_cli_send_relays_stdin() {
    let addr = spawn_line_server();
    let work = tempfile::tempdir().unwrap();

    let mut child = Command::new(binary())
        .arg("--config")
        .arg(empty_config(work.path()))
        .args(["send", "127.0.0.1", &addr.port().to_string()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child.stdin.take().unwrap().write_all(b"stats\r\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    assert_eq!(output.stdout, b"OK 5\r\nup\r\n");
}

#[test]
fn test_cli_rejects_zero_timeout() {
    let corpus = write_corpus(&[("stats.txt", &b"stats\r\n"[..])]);
    let work = tempfile::tempdir().unwrap();

    let output = Command::new(binary())
        .arg("--config")
        .arg(empty_config(work.path()))
        .args(["run", "127.0.0.1", "11300"])
        .arg(corpus.path())
        .args(["--read-timeout-ms", "0"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("read-timeout-ms"));
}
