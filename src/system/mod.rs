//! Thin wrappers around the operating system surfaces the agent touches:
//! the service manager, the process table, and the ssh remote channel.

pub mod process;
pub mod remote;
pub mod service;

pub use remote::SshChannel;
