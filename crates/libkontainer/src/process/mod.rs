//! The container bootstrap pipeline: process topology, synchronization and
//! the in-container init sequence.
pub mod args;
pub mod channel;
pub mod container_init_process;
pub mod container_intermediate_process;
pub mod container_main_process;
pub mod fork;
pub mod message;
pub mod seccomp_listener;
pub mod sync;
