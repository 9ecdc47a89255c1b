//! Install-transaction support: pre-install activation snapshots and
//! post-install relocation into the canonical component directory.

pub mod host;
pub mod relocator;
pub mod transaction;

pub use host::{ActivationError, ActivationRegistry, ActivationScope, DirectoryMover, FsMover};
pub use relocator::{
    ExtractedPackage, InstallFailure, InstallResult, InstallRoots, PostInstallRelocator,
    RelocateError, RelocationOutcome,
};
pub use transaction::{ActiveStateRecord, InstallTransaction};
