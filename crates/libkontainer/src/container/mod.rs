//! Container creation and lifecycle management. The builder configures and
//! creates an init container; start, kill and delete live as methods on
//! the resulting [`Container`].
pub mod builder;
mod builder_impl;
#[allow(clippy::module_inception)]
mod container;
mod container_delete;
mod container_kill;
mod container_start;
pub mod init_builder;
pub mod state;

pub use container::Container;
pub use state::{ContainerStatus, State};
