//! Cross-registration of sibling containers.
//!
//! Containers in one group share a network namespace, so every sibling is
//! reachable on loopback. Writing `127.0.0.1 <name>` into the first
//! container's `/etc/hosts` lets it address its siblings by name.

use crate::models::group::ContainerGroup;

/// Interpreter started for the cross-registration session.
pub const HOSTS_SHELL: &str = "/bin/sh";

/// Build the command list that registers the first container's siblings.
///
/// One `echo` line per container after the first, in realized order,
/// followed by `exit`. Returns an empty list for groups with fewer than
/// two containers.
#[must_use]
pub fn cross_registration_script(group: &ContainerGroup) -> Vec<String> {
    if group.containers.len() < 2 {
        return Vec::new();
    }

    group
        .containers
        .iter()
        .skip(1)
        .map(|sibling| format!("echo 127.0.0.1 {} >> /etc/hosts", sibling.name))
        .chain(std::iter::once("exit".to_owned()))
        .collect()
}
