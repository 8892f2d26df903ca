//! Layer discovery and volume resolution.
//!
//! [`SourceScanner`] probes a source layer by layer into a [`ScanTree`].
//! [`VolumeScanner`] walks that tree and, with help from a [`ScanMediator`]
//! for the choices it cannot make alone, returns the file systems worth
//! processing. [`WindowsVolumeScanner`] narrows those to Windows system
//! volumes.

pub mod context;
pub mod identifiers;
pub mod source;
pub mod tree;
pub mod volume;
pub mod windows;

pub use context::{ScanContext, SourceType};
pub use source::SourceScanner;
pub use tree::{NodeId, ScanNode, ScanTree};
pub use volume::{Cancelled, ScanMediator, VolumeScanner};
pub use windows::{WindowsPathResolver, WindowsVolumeScanner};
