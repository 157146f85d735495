// Application layer - use cases and orchestration.
// The CLI talks only to `PortalService`; storage stays behind it.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
