// Download pipeline - resolve, select, fetch, merge, deliver

pub mod context;
pub mod errors;
pub mod fetcher;
pub mod merger;
pub mod models;
pub mod resolver;
pub mod selector;
pub mod tools;
pub mod utils;
pub mod workflow;

pub use context::RequestContext;
pub use errors::PipelineError;
pub use fetcher::Fetcher;
pub use merger::Merger;
pub use models::{
    DeliveredVideo, DownloadProgress, MediaKind, Selection, SelectionPolicy, StreamDescriptor,
    TrackKind, VideoDetails,
};
pub use resolver::{ProbeConfig, ProbeMode, ResolveReason, Resolver};
pub use selector::Selector;
pub use workflow::{Pipeline, PipelineConfig};
