// file: src/provision/disk.rs
// version: 1.0.0
// guid: e1a4b7c0-3d6f-4925-b6e1-a4b7c0d3f6a9

//! Destructive storage-pool teardown on the rescue system

use crate::network::RemoteShell;
use crate::Result;
use tracing::{debug, info};

/// Storage pool cleared before installation
pub const POOL_NAME: &str = "zroot";

/// Fixed set of disk device names wiped on every run
pub const POOL_DISKS: [&str; 2] = ["ada0", "ada1"];

/// Label-clear attempts per disk; later attempts are expected to no-op when
/// earlier ones already succeeded
pub const LABELCLEAR_ATTEMPTS: usize = 5;

/// Build the fixed wipe command sequence: pool export and destroy, then per
/// disk the label-clear attempts followed by a partition-table destroy.
pub fn pool_wipe_commands(pool: &str, disks: &[&str]) -> Vec<String> {
    let mut commands = vec![
        format!("sudo zpool export -f {}", pool),
        format!("sudo zpool destroy -f {}", pool),
    ];
    for disk in disks {
        for partition in 0..LABELCLEAR_ATTEMPTS {
            commands.push(format!("sudo zpool labelclear -f /dev/{}p{}", disk, partition));
        }
        commands.push(format!("sudo gpart destroy -F {}", disk));
    }
    commands
}

/// Run the wipe sequence over the rescue-tool session. Exit codes never gate
/// progression; failures are only visible in the captured output. Only a
/// transport failure aborts.
pub async fn wipe_pool<S: RemoteShell>(shell: &mut S, pool: &str, disks: &[&str]) -> Result<()> {
    info!("Destroying storage pool: {}", pool);
    for command in pool_wipe_commands(pool, disks) {
        let output = shell.exec(&command).await?;
        debug!("{}: {}", command, output.stdout.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wipe_plan_shape_per_disk() {
        let commands = pool_wipe_commands(POOL_NAME, &POOL_DISKS);

        // export + destroy, then (5 labelclear + 1 gpart destroy) per disk
        assert_eq!(commands.len(), 2 + POOL_DISKS.len() * (LABELCLEAR_ATTEMPTS + 1));
        assert_eq!(commands[0], "sudo zpool export -f zroot");
        assert_eq!(commands[1], "sudo zpool destroy -f zroot");

        for (d, disk) in POOL_DISKS.iter().enumerate() {
            let base = 2 + d * (LABELCLEAR_ATTEMPTS + 1);
            for i in 0..LABELCLEAR_ATTEMPTS {
                assert_eq!(
                    commands[base + i],
                    format!("sudo zpool labelclear -f /dev/{}p{}", disk, i)
                );
            }
            assert_eq!(
                commands[base + LABELCLEAR_ATTEMPTS],
                format!("sudo gpart destroy -F {}", disk)
            );
        }
    }

    #[test]
    fn test_wipe_plan_single_disk() {
        let commands = pool_wipe_commands("tank", &["nvd0"]);
        assert_eq!(commands.len(), 2 + 6);
        assert!(commands.contains(&"sudo gpart destroy -F nvd0".to_string()));
    }
}
