//! End-to-end tests wiring supervised processes together

#![cfg(unix)]

use futures::future::join_all;
use procstream::{EventReceiver, ProcessConfig, ProcessEvent, ProcessSupervisor, StdioStreams};
use proptest::prelude::*;
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn next_event(events: &mut EventReceiver) -> Option<ProcessEvent> {
    tokio::time::timeout(TEST_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a process event")
}

async fn expect_started(events: &mut EventReceiver) -> StdioStreams {
    match next_event(events).await {
        Some(ProcessEvent::Started(streams)) => streams,
        other => panic!("expected Started, got {:?}", other),
    }
}

async fn expect_exited(events: &mut EventReceiver) -> i32 {
    match next_event(events).await {
        Some(ProcessEvent::Exited { exit_code }) => exit_code,
        other => panic!("expected Exited, got {:?}", other),
    }
}

#[tokio::test]
async fn test_producer_into_consumer() {
    let producer = ProcessConfig::new("printf").args(["alpha\\nbeta\\n"]);
    let consumer = ProcessConfig::new("tr").args(["a-z", "A-Z"]);

    let (producer_handle, mut producer_events) = ProcessSupervisor::spawn(producer).unwrap();
    let (consumer_handle, mut consumer_events) = ProcessSupervisor::spawn(consumer).unwrap();

    let upstream = expect_started(&mut producer_events).await;
    let downstream = expect_started(&mut consumer_events).await;
    drop(upstream.stdin);

    let mut source = upstream.stdout;
    let sink = downstream.stdin;
    let forward = async move {
        while let Some(chunk) = source.next_chunk().await {
            sink.send(chunk.unwrap()).await.unwrap();
        }
        sink.close();
    };
    let (_, _, output) = tokio::join!(
        forward,
        upstream.stderr.read_to_end(),
        downstream.stdout.read_to_end(),
    );
    drop(downstream.stderr);

    assert_eq!(output.unwrap(), b"ALPHA\nBETA\n");
    assert_eq!(expect_exited(&mut producer_events).await, 0);
    assert_eq!(expect_exited(&mut consumer_events).await, 0);

    producer_handle.join().await;
    consumer_handle.join().await;
}

#[tokio::test]
async fn test_many_supervisors_each_exit_once() {
    let runs = (0..16).map(|i| async move {
        let config = ProcessConfig::new("sh").args(["-c".to_string(), format!("echo {}; exit {}", i, i % 4)]);
        let (handle, mut events) = ProcessSupervisor::spawn(config).unwrap();

        let streams = expect_started(&mut events).await;
        let (stdout, _) = tokio::join!(streams.stdout.read_to_end(), streams.stderr.read_to_end());
        assert_eq!(stdout.unwrap(), format!("{}\n", i).into_bytes());

        let exit_code = expect_exited(&mut events).await;
        handle.join().await;
        assert!(next_event(&mut events).await.is_none());
        exit_code
    });

    let codes = join_all(runs).await;
    let expected: Vec<i32> = (0..16).map(|i| i % 4).collect();
    assert_eq!(codes, expected);
}

async fn cat_round_trip(data: Vec<u8>) -> Vec<u8> {
    let (handle, mut events) = ProcessSupervisor::spawn(ProcessConfig::new("cat").buffer_size(64)).unwrap();
    let streams = expect_started(&mut events).await;

    let stdin = streams.stdin;
    let write = async move {
        for chunk in data.chunks(100) {
            stdin.send(chunk.to_vec()).await.unwrap();
        }
        stdin.close();
    };
    let (_, echoed, _) = tokio::join!(write, streams.stdout.read_to_end(), streams.stderr.read_to_end());

    assert_eq!(expect_exited(&mut events).await, 0);
    handle.join().await;
    echoed.unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Arbitrary bytes written to cat come back unchanged
    #[test]
    fn prop_cat_echoes_input(data in prop::collection::vec(any::<u8>(), 0..4096)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let echoed = runtime.block_on(cat_round_trip(data.clone()));
        prop_assert_eq!(echoed, data);
    }
}
