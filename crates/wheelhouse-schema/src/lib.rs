//! Shared data model for the wheelhouse engine.
//!
//! Everything in this crate is pure: name/version newtypes, wheel
//! filename tag parsing, the platform compatibility policy table,
//! artifact descriptors, and PEP 508-style dependency requirements.
//! No I/O happens here.

pub mod artifact;
pub mod requirement;
pub mod tags;
pub mod types;

pub use artifact::{ArtifactDescriptor, ArtifactError};
pub use requirement::Requirement;
pub use tags::{TagPolicy, WheelTag};
pub use types::{PackageName, PackageRequest, PlatformTag, RuntimeTarget, Version, VersionSpec};
