pub mod config;
pub mod error;
pub mod snapshot;
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use snapshot::{ConsoleMessage, DomNode, NetworkRequest, PageContent, TabSnapshot};
pub use wire::{Action, ActionFrame, AgentFrame, DataSource};
