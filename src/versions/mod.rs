//! # Version Discovery
//!
//! The version-identity engine: which copies of an object exist, in what
//! order, and where their bytes come from.
//!
//! An object is addressed by `(container, path)`. Its live copy and every
//! snapshot copy are related only through `PathLayout`; the resolver queries
//! both sources concurrently and merges the answers into a deterministic,
//! newest-first `VersionListing`.
//!
//! ```ignore
//! let resolver = VersionResolver::new(live, snapshots, ResolverOptions::default());
//! let address = ObjectAddress::new("test-bucket", "documents/document1.txt")?;
//! let listing = resolver.list_versions(&address, &cancel).await?;
//! let handle = resolver
//!     .resolve_content(&address, &listing.versions[1].version_id, &cancel)
//!     .await?;
//! ```

pub mod address;
pub mod errors;
pub mod layout;
pub mod query;
pub mod record;
pub mod resolver;
pub mod snapshot;

pub use address::{ObjectAddress, ObjectPrefix};
pub use errors::{VersionError, VersionResult};
pub use layout::PathLayout;
pub use query::{QueryPolicy, ResolverOptions};
pub use record::{
    sort_history, VersionId, VersionListing, VersionOrigin, VersionRecord, CURRENT_VERSION,
};
pub use resolver::{ContentHandle, VersionResolver};
pub use snapshot::{parse_snapshot_time, CatalogScan, SnapshotCatalog, SnapshotDescriptor};
