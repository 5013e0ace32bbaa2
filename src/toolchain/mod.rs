//! External toolchain stages.
//!
//! Each stage wraps one or more external programs: the AD build and
//! recording run ([`GraphBuilder`]), derivative code generation
//! ([`CodeGenerator`]) and the native library build ([`NativeBuilder`]).

pub mod codegen;
pub mod graph;
pub mod native;
pub mod process;
pub mod templates;

pub use codegen::CodeGenerator;
pub use graph::GraphBuilder;
pub use native::{NativeArtifacts, NativeBuilder};
pub use process::{ExitPolicy, ToolInvocation, ToolOutput, ToolRunner};
