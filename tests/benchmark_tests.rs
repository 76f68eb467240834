//! Performance benchmarks for the relay's hot paths

use server::ranking::RankingStore;
use server::{start, RelayConfig};
use shared::framing::{decode_snapshot, decode_update, encode_frame, read_frame};
use shared::{LeaderboardEntry, ScoreUpdate, Snapshot};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Benchmarks ranking insertion on a full board
#[test]
fn benchmark_ranking_updates() {
    let mut store = RankingStore::new(8);

    let iterations = 100_000u64;
    let start = Instant::now();

    for i in 0..iterations {
        // Mix of entries that rank and entries that fall off.
        let pumps = (i * 7919) % 128;
        store.record_update(LeaderboardEntry::new(i, pumps));
    }

    let duration = start.elapsed();
    println!(
        "Ranking updates: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(store.len(), 8);
    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks snapshot encoding and decoding
#[test]
fn benchmark_snapshot_codec() {
    let snapshot: Snapshot = (0..8u64)
        .map(|i| LeaderboardEntry::new(format!("player{}", i), 128 - i))
        .collect();

    let iterations = 20_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let frame = encode_frame(&snapshot).unwrap();
        let decoded = decode_snapshot(frame.trim_end()).unwrap();
        assert_eq!(decoded.len(), 8);
    }

    let duration = start.elapsed();
    println!(
        "Snapshot codec: {} round trips in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks update parsing, including the legacy string form
#[test]
fn benchmark_update_decoding() {
    let frames = [
        r#"{"id":"3","pumps":42}"#,
        r#"{"id":7,"pumps":"13"}"#,
        r#"{"pumps":0}"#,
    ];

    let iterations = 30_000;
    let start = Instant::now();

    for i in 0..iterations {
        let update: ScoreUpdate = decode_update(frames[i % frames.len()]).unwrap();
        assert!(update.pumps <= 42);
    }

    let duration = start.elapsed();
    println!(
        "Update decoding: {} messages in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks update → broadcast round trips through a live relay
#[tokio::test]
async fn benchmark_relay_round_trip() {
    let relay = start(RelayConfig::local_ephemeral()).await.unwrap();
    let stream = TcpStream::connect(relay.local_addr()).await.unwrap();
    stream.set_nodelay(true).unwrap();
    let mut reader = BufReader::new(stream);

    let iterations = 500u64;
    let start = Instant::now();

    for i in 0..iterations {
        let line = format!("{{\"id\":\"bench\",\"pumps\":{}}}\n", i);
        reader.get_mut().write_all(line.as_bytes()).await.unwrap();

        let frame = timeout(Duration::from_secs(5), read_frame(&mut reader))
            .await
            .expect("relay stopped answering")
            .unwrap()
            .unwrap();
        assert_eq!(decode_snapshot(&frame).unwrap()[0].pumps, i);
    }

    let duration = start.elapsed();
    println!(
        "Relay round trip: {} updates in {:?} ({:.2} μs/update)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Loopback round trips should stay well under 10ms each
    assert!(duration < Duration::from_secs(5));

    relay.shutdown().await.unwrap();
}
