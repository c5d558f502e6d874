//! Stream lifecycle walkthrough
//!
//! Run with: cargo run --example stream_lifecycle
//!
//! Set RUST_LOG=stream_manager=debug to see the manager's own events.

use std::sync::Arc;

use stream_manager::{
    CloseMode, ListenerId, ManagedStream, ManagerConfig, OwningStreamManager, PacketStream,
    StreamState, TrackingStreamManager,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("stream_lifecycle=info".parse().unwrap()),
        )
        .init();

    owned_streams();
    caller_owned_streams();
}

/// The manager owns the streams and frees them once they close
fn owned_streams() {
    let manager = OwningStreamManager::with_config(ManagerConfig::default().label("Ingest"));

    manager.add_stream(PacketStream::new("camera-1"));
    manager.add_stream(PacketStream::with_close_mode("camera-2", CloseMode::Deferred));
    manager.add_stream(PacketStream::new("microphone"));
    tracing::info!("{}", manager);

    // Observers connected by the application run before the manager cleans up
    if let Some(stream) = manager.get_stream("camera-1") {
        stream
            .state_change()
            .connect(ListenerId::next(), 0, |sender, new_state, old_state| {
                tracing::info!(
                    stream = sender.name(),
                    from = %old_state,
                    to = %new_state,
                    "Observed transition"
                );
            });
    }

    manager.close_stream("camera-1");
    manager.close_stream("camera-2");
    tracing::info!(streams = ?manager.names(), "After close requests");

    if let Some(stream) = manager.get_stream("camera-2") {
        stream.finish_close();
    }
    tracing::info!(streams = ?manager.names(), "After deferred close completed");

    // Dropping the manager closes "microphone"
}

/// The caller keeps ownership; the manager only tracks the streams
fn caller_owned_streams() {
    let manager = TrackingStreamManager::new();
    let stream = Arc::new(PacketStream::new("screen"));
    manager.add_stream(&stream);

    stream.close();

    tracing::info!(
        registered = manager.contains("screen"),
        still_usable = stream.state() == StreamState::Closed,
        "Caller-owned stream closed"
    );
}
