//! Liveness domain: models, reconciler, and the services around it.

mod dispatcher;
mod event;
mod ingest;
mod model;
mod poller;
mod presenter;
mod reconciler;
mod store;

pub use dispatcher::*;
pub use event::*;
pub use ingest::*;
pub use model::*;
pub use poller::*;
pub use presenter::*;
pub use reconciler::*;
pub use store::*;
