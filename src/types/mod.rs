//! Public types for the Huginn API.

mod metadata;
mod policy;
mod resource;
mod source;
mod state;

pub use metadata::ResourceMetadata;
pub use policy::{CachePolicy, ResolveOptions};
pub use resource::Resource;
pub use source::ResourceRef;
pub use state::{LoadError, LoadingState};
