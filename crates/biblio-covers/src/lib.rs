//! Cover image pipeline: allow-listed download, decode, resize to
//! three bound tiers without upscaling, WebP transcode, and blob upload.

mod allow_list;
mod blob_store;
mod error;
mod processor;

pub use allow_list::{AllowedHost, HostAllowList};
pub use blob_store::{BlobStore, FilesystemBlobStore, S3BlobStore, S3Config};
pub use error::{CoverProcessError, ProviderUrlKind};
pub use processor::{CoverMetrics, CoverProcessOutcome, CoverProcessor, CoverSizeTier};
