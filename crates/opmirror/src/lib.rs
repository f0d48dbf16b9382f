//! Operator API mirroring library
//!
//! Republishes the API surface of an upstream Go module as a standalone
//! module. This crate provides:
//! - Import-only scanning of Go sources
//! - Dependency closure over the upstream module's internal packages
//! - Deterministic, atomic copying of API surface and internal packages
//! - Import rewriting from the upstream module path to the mirror's
//! - Version tag reconciliation through the VCS
//! - The operators registry that drives all of the above

pub mod closure;
pub mod error;
pub mod fsutil;
pub mod gomod;
pub mod operator;
pub mod registry;
pub mod rewrite;
pub mod scan;
pub mod tag;
pub mod tools;

pub use closure::{internal_imports, internal_suffix, ClosureResolver, ResolvedPackage};
pub use error::{ErrorKind, MirrorError};
pub use gomod::GoModule;
pub use operator::{mirrors_prefix, MirrorReport, MirrorSettings, MirrorsDir, OperatorConfig};
pub use registry::{OperatorsFile, DEFAULT_OPERATORS_FILE};
pub use rewrite::{ImportRewriter, RewriteMode};
pub use scan::{parse_imports, ImportSpec, ParseError, SyntaxError};
pub use tag::{TagReconciler, TagReport, TagState};
pub use tools::{DependencyLocker, GitCli, GoModTidy, SkipLock, TagStore, ToolError};
