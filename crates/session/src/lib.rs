pub mod cache;
pub mod mux;
pub mod registry;
pub mod session;

use std::sync::Arc;

use tabbridge_core::Config;

pub use cache::SnapshotCache;
pub use mux::Multiplexer;
pub use registry::{spawn_sweeper, SessionRegistry};
pub use session::{handle_socket, AgentSession, SessionState};

/// Shared state behind the bridge: session registry, request multiplexer
/// and snapshot cache, wired together once at startup.
pub struct BridgeState {
    pub config: Config,
    pub registry: Arc<SessionRegistry>,
    pub cache: Arc<SnapshotCache>,
    pub mux: Arc<Multiplexer>,
}

impl BridgeState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());
        let cache = Arc::new(SnapshotCache::new(&config.limits));
        let mux = Arc::new(Multiplexer::new(registry.clone(), cache.clone(), &config));
        Arc::new(Self {
            config,
            registry,
            cache,
            mux,
        })
    }
}
