//! Thread-safe registry of named streams
//!
//! Streams are registered by name and removed automatically once they report
//! the terminal `Closed` state through their state-change signal.
//!
//! ```
//! use stream_manager::{ManagedStream, OwningStreamManager, PacketStream};
//!
//! let manager = OwningStreamManager::new();
//! assert!(manager.add_stream(PacketStream::new("camera")));
//! assert!(!manager.add_stream(PacketStream::new("camera")));
//!
//! let stream = manager.get_stream("camera").unwrap();
//! stream.close();
//!
//! assert!(!manager.contains("camera"));
//! assert!(!manager.close_stream("camera"));
//! ```

pub mod manager;
pub mod registry;
pub mod stream;

pub use manager::{
    ManagerConfig, Owned, Ownership, OwningStreamManager, StreamManager, TrackingStreamManager,
    Unowned,
};
pub use registry::{Registry, RegistryError, RegistryHooks};
pub use stream::{CloseMode, ListenerId, ManagedStream, PacketStream, StateSignal, StreamState};
