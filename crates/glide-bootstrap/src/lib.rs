//! GLIDE Bootstrap - environment setup and backend handoff
//!
//! Drives the lifecycle that takes a bare checkout to a running
//! backend: ensure the virtualenv, activate it, resolve dependencies,
//! run the read-only preflight scan, then hand off to uvicorn. Blocking
//! step failures terminate the sequence before the server is ever
//! started; advisory failures are reported and the sequence continues.

pub mod launch;
pub mod sequence;
pub mod system;

pub use launch::{LaunchSpec, UvicornLauncher};
pub use sequence::{
    BackendLauncher, BootstrapOptions, BootstrapRun, BootstrapSequence, BootstrapState,
    DependencyResolver, EnvLifecycle,
};
pub use system::SystemEnv;
