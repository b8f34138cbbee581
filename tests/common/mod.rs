#![allow(dead_code)]

use std::net::SocketAddr;

use plinth::boot::Sequencer;
use plinth::config::PlinthConfig;
use plinth::serve::Transports;
use plinth::SequenceRun;

pub fn test_config() -> PlinthConfig {
    PlinthConfig {
        http_only: true,
        host: "localhost".to_string(),
        ..PlinthConfig::default()
    }
}

/// Bind a loopback transport and run the full bootstrap sequence.
pub async fn start(sequencer: &Sequencer) -> (SequenceRun, SocketAddr) {
    let transports = Transports::bind_http("127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind loopback");
    let run = sequencer.run(transports).await.expect("bootstrap sequence");
    let addr = run.local_addr().expect("attached transport");
    (run, addr)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}
