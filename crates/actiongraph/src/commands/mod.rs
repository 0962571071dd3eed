//! Workspace-level commands that run before a store exists.

pub mod init;
