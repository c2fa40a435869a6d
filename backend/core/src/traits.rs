use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::message::Command;

/// A long-running runtime component driven by a command channel.
///
/// Each component runs its event loop in its own Tokio task and owns all of
/// its mutable state inside that loop.
#[async_trait]
pub trait Component: Send + Sync + 'static {
    /// Human-readable name of this component.
    fn name(&self) -> &str;

    /// Run the component's event loop until the channel closes or it is told to shut down.
    async fn start(&self, rx: mpsc::Receiver<Command>) -> Result<()>;
}
