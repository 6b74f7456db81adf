// kiln-common/src/model/mod.rs
pub mod build;
pub mod command;
pub mod dependency;
pub mod environment;
pub mod package;
pub mod resource;

pub use build::{BuildSpec, BuildSystemKind};
pub use command::CommandSpec;
pub use dependency::{Dependency, DependencyExt, DependencyKind};
pub use environment::{EnvEntry, EnvironmentOverlay, MergeStrategy};
pub use package::{HeadSpec, PackageDescriptor, ResolvedSource, SourceSelection};
pub use resource::{validate_resources, Resource, ResourceDescriptor};
