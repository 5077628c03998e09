mod common;

use std::time::Duration;

use adapter::{Connector, NetworkState};
use coordinator::{Config, Coordinator, Event, Events, MemoryStore};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

use common::*;

/// Hands out a single in-memory stream.
struct Once(Option<DuplexStream>);

impl Connector for Once {
    type Stream = DuplexStream;

    fn connect(&mut self) -> adapter::Result<DuplexStream> {
        self.0
            .take()
            .ok_or_else(|| adapter::ErrorKind::TransportUnavailable.into())
    }
}

async fn serve(mut stream: DuplexStream) {
    let mut adapter = FakeAdapter::new();
    let mut buffer = [0u8; 512];
    loop {
        let n = match stream.read(&mut buffer).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let reply = adapter.handle(&buffer[..n]);
        if stream.write_all(&reply).await.is_err() {
            return;
        }
    }
}

async fn wait_for<F>(events: &mut Events, mut wanted: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    let found = timeout(Duration::from_secs(60), async {
        while let Some(event) = events.recv().await {
            if wanted(&event) {
                return Some(event);
            }
        }
        None
    });
    found
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

fn spawn() -> (Coordinator, Events) {
    let (near, far) = tokio::io::duplex(1024);
    tokio::spawn(serve(far));
    Coordinator::spawn(
        Config::default(),
        Once(Some(near)),
        Box::new(MemoryStore::new()),
    )
}

#[tokio::test(start_paused = true)]
async fn brings_network_up_over_a_stream() {
    let (coordinator, mut events) = spawn();

    let started = wait_for(&mut events, |event| matches!(event, Event::NetworkStarted(_))).await;
    match started {
        Event::NetworkStarted(configuration) => {
            assert_eq!(configuration.ieee_address, ADAPTER_IEEE);
            assert_eq!(coordinator.configuration(), Some(configuration));
        }
        other => panic!("unexpected {:?}", other),
    }

    let (version, _) = coordinator.version().await.unwrap();
    assert_eq!(version.major, 0x26);
    let device_state = coordinator.device_state().await.unwrap();
    assert_eq!(device_state.network_state, NetworkState::Connected);

    let nodes = coordinator.nodes().await.unwrap();
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].is_coordinator());
}

#[tokio::test(start_paused = true)]
async fn permit_joining_and_stop() {
    let (mut coordinator, mut events) = spawn();
    wait_for(&mut events, |event| matches!(event, Event::NetworkStarted(_))).await;

    coordinator
        .set_permit_joining(Duration::from_secs(60), None)
        .await
        .unwrap();

    coordinator.stop_network().await.unwrap();
    wait_for(&mut events, |event| matches!(event, Event::NetworkStopped)).await;
    if coordinator.configuration().is_some() {
        assert_eq!(coordinator.configuration_changed().await.unwrap(), None);
    }
}

#[tokio::test(start_paused = true)]
async fn requests_fail_once_adapter_is_gone() {
    let (coordinator, mut events) = Coordinator::spawn(
        Config::default(),
        Once(None),
        Box::new(MemoryStore::new()),
    );

    let error = coordinator.device_state().await.unwrap_err();
    assert!(error.is_transport_unavailable());
    drop(coordinator);
    assert!(timeout(Duration::from_secs(60), events.recv())
        .await
        .unwrap()
        .is_none());
}
