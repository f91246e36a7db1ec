//! Message catalog of the console.
//!
//! Texts take positional arguments written `{0}`, `{1}` and `{2}`.

fn catalog(key: &str) -> Option<&'static str> {
    let text = match key {
        // Console sentinels
        "error.-1000" => "The requested object no longer exists.",
        "error.-1001" => "The archive policy or criteria no longer exists.",
        "error.-1008" => "The host is not a member of the shared file system.",
        "error.-1009" => "The file already exists.",
        "error.-1010" => "The request contains invalid input.",
        "error.-1099" => "The operation completed but had no visible effect.",
        "error.-2000" => "The console could not update its inventory on {0}.",
        "error.-2800" => "Cannot connect to {0}.",
        "error.-2801" => "The request to {0} timed out.",
        "error.-2802" => "The network connection to {0} is down.",
        "error.-2803" => "Access to {0} was denied.",
        "error.-3333" => "Enter a positive whole number.",
        "error.developer_bug" => "Unexpected {0} \"{1}\" submitted by the page.",

        // Alerts
        "alert.partial" => "Completed with errors",
        "success.summary" => "Success",
        "archiver.config.error" => "The archiver configuration reported errors",
        "archiver.config.warning" => "The archiver configuration reported warnings",
        "common.yes" => "Yes",
        "common.no" => "No",

        // Pages
        "page.fs_summary" => "File Systems",
        "page.fs_details" => "File System {0}",
        "page.mount_options" => "Mount Options of {0}",
        "page.shared_fs" => "Shared File System {0}",
        "page.add_member" => "Add Host to {0}",
        "page.file_browser" => "File Browser",
        "page.file_details" => "Details of {0}",
        "page.archive_policies" => "Archive Policies of {0}",
        "page.recovery_schedule" => "Recovery Point Schedule of {0}",
        "page.recovery_points" => "Recovery Points of {0}",

        // File system summary
        "fs.summary.error" => "File system operation failed",
        "fs.menu.label" => "-- Operations --",
        "fs.menu.edit_mount_options" => "Edit Mount Options",
        "fs.menu.check_fs" => "Check File System",
        "fs.menu.mount" => "Mount",
        "fs.menu.unmount" => "Unmount",
        "fs.menu.grow" => "Grow",
        "fs.menu.shrink" => "Shrink",
        "fs.menu.delete" => "Delete",
        "fs.menu.archive_activities" => "Archive Activities",
        "fs.menu.schedule_dump" => "Schedule Recovery Points",
        "fs.filter.all" => "All File Systems",
        "fs.filter.qfs" => "SAM-QFS File Systems",
        "fs.filter.ufs" => "UFS File Systems",
        "fs.filter.vxfs" => "VxFS File Systems",
        "fs.filter.nfs" => "NFS Shared File Systems",
        "fs.role.unshared" => "unshared",
        "fs.role.mds" => "metadata server",
        "fs.role.pmds" => "potential metadata server",
        "fs.role.client" => "client",
        "fs.type.shared" => "{0} (shared, {1})",
        "fs.type.ha" => "{0} (HA)",
        "fs.state.mounted" => "Mounted",
        "fs.state.unmounted" => "Unmounted",

        // File system operations
        "fs.details.error" => "Failed to load file system {0}",
        "fs.mount.done" => "File system {0} was mounted.",
        "fs.mount.error" => "Failed to mount {0}",
        "fs.unmount.done" => "File system {0} was unmounted.",
        "fs.unmount.error" => "Failed to unmount {0}",
        "fs.delete.done" => "File system {0} was deleted.",
        "fs.delete.error" => "Failed to delete the file system",
        "fs.delete.pending.summary" => "Deletion in progress",
        "fs.delete.pending" => "{0} is still reported by some hosts. Refresh later.",
        "fs.resize.summary" => "Resize from the command line",
        "fs.grow.command" => "Add devices to {0} with samgrowfs.",
        "fs.shrink.command" => "Remove devices from {0} with samadm eq-release.",
        "fs.samfsck.error" => "Failed to check file system {0}",
        "fs.samfsck.job" => "Check of {0} started as job {1}. The log is written to {2}.",
        "fs.samfsck.done" => "Check of {0} completed. See {1}.",
        "fs.samfsck.log.invalid" => "The log file must be an absolute path.",

        // Mount options
        "mount.load.error" => "Failed to load the mount options of {0} on {1}",
        "mount.save.done" => "Mount options of {0} on {1} were saved.",
        "mount.save.error" => "Failed to save the mount options of {0} on {1}",
        "mount.invalid.number" => "{0} must be a whole number, not \"{1}\".",
        "mount.invalid.percent" => "{0} must be between 0 and 100.",
        "mount.invalid.watermarks" => {
            "The low water mark must be lower than the high water mark."
        }
        "mount.type.unshared_samqfs" => "SAM-QFS",
        "mount.type.unshared_qfs" => "QFS",
        "mount.type.unshared_samfs" => "SAM-FS",
        "mount.type.shared_samqfs" => "Shared SAM-QFS",
        "mount.type.shared_qfs" => "Shared QFS",
        "mount.field.hwm" => "High water mark",
        "mount.field.lwm" => "Low water mark",
        "mount.field.stripe_width" => "Stripe width",
        "mount.field.readahead" => "Readahead",
        "mount.field.writebehind" => "Writebehind",
        "mount.field.write_throttle" => "Write throttle",
        "mount.field.flush_behind" => "Flush behind",
        "mount.field.stage_flush_behind" => "Stage flush behind",
        "mount.field.partial_release" => "Partial release size",
        "mount.field.max_partial" => "Maximum partial release size",
        "mount.field.mount_retries" => "Mount retries",
        "mount.field.metadata_refresh" => "Metadata refresh rate",
        "mount.field.min_pool" => "Minimum pool",
        "mount.field.read_lease" => "Read lease",
        "mount.field.write_lease" => "Write lease",
        "mount.field.append_lease" => "Append lease",
        "mount.field.lease_timeout" => "Lease timeout",

        // Shared file systems
        "shared.load.error" => "Failed to load the members of {0}",
        "shared.action.error" => "Unknown operation on {0}",
        "shared.remove.done" => "{0} was removed from {1}.",
        "shared.remove.error" => "Failed to remove {0}",
        "member.load.error" => "Failed to load the hosts available to {0}",
        "member.add.done" => "{0} was added to {1}.",
        "member.add.error" => "Failed to add {0} to {1}",
        "member.add.pending.summary" => "Host added",
        "member.add.pending" => "{0} does not report {1} yet. Refresh later.",
        "member.validate.host" => "Select a host.",
        "member.validate.mount_point" => "The mount point must be an absolute path.",
        "member.validate.ip" => "Select the primary IP address.",
        "member.validate.marked" => {
            "The selected host has a different architecture than the metadata server."
        }

        // Files
        "file.online" => "Online",
        "file.offline" => "Offline",
        "file.browser.truncated" => "Showing {0} of {1} entries",
        "file.browser.error" => "Failed to list {0}",
        "file.browser.max_entries" => "Invalid number of entries",
        "file.details.error" => "Failed to load the details of {0}",
        "file.mode.archive" => "Archiving",
        "file.mode.release" => "Releasing",
        "file.mode.stage" => "Staging",
        "file.option.archive.default" => "Archive as defined by the policies",
        "file.option.archive.never" => "Never archive",
        "file.option.release" => "Release",
        "file.option.release.never" => "Never release",
        "file.option.release.default" => "When space is required",
        "file.option.release.always" => "As soon as one copy is archived",
        "file.option.stage" => "Stage",
        "file.option.stage.never" => "Never stage",
        "file.option.stage.default" => "When the file is accessed",
        "file.option.stage.associative" => "With the other files of its directory",
        "file.partial.help" => "Partial release size in kilobytes, from {0} to {1}.",
        "file.partial.invalid" => "The partial release size must be between {0} and {1}.",
        "file.archive.done" => "Archiving attributes of {0} were changed.",
        "file.archive.error" => "Failed to change the archiving attributes of {0}",
        "file.release.done" => "Releasing attributes of {0} were changed.",
        "file.release.error" => "Failed to change the releasing attributes of {0}",
        "file.stage.done" => "Staging attributes of {0} were changed.",
        "file.stage.error" => "Failed to change the staging attributes of {0}",

        // Archive policies
        "policy.load.error" => "Failed to load the archive policies of {0}",
        "policy.remove.done" => "Policy {0} no longer applies to {1}.",
        "policy.remove.error" => "Failed to remove policy {0} from {1}",
        "policy.reorder.done" => "The criteria of {0} were reordered.",
        "policy.reorder.error" => "Failed to reorder the criteria of {0}",

        // Recovery points
        "schedule.repeat" => "Repeat every {0} {1}",
        "schedule.disabled" => "(disabled)",
        "schedule.retain" => "Keep for {0} {1}",
        "schedule.retain.forever" => "Keep forever",
        "schedule.load.error" => "Failed to load the recovery point schedule of {0}",
        "schedule.save.done" => "The recovery point schedule of {0} was saved.",
        "schedule.save.error" => "Failed to save the recovery point schedule of {0}",
        "schedule.invalid.location" => "The location must be an absolute path.",
        "schedule.invalid.periodicity" => "The period must be a positive whole number.",
        "schedule.invalid.unit" => "Select a time unit.",
        "schedule.invalid.start" => "The start time must be written HH:MM.",
        "schedule.invalid.retention" => "The retention must be a positive whole number.",
        "schedule.invalid.excluded" => "Excluded directory {0} must be an absolute path.",
        "recovery.list.error" => "Failed to list the recovery points in {0}",
        "recovery.index.processing" => "Indexing",
        "recovery.index.broken" => "Damaged",
        "recovery.index.job" => "Indexing of {0} started as job {1}.",
        "recovery.index.done" => "Recovery point {0} was indexed.",
        "recovery.index.error" => "Failed to index {0}",
        "recovery.unindex.done" => "The index of {0} was deleted.",
        "recovery.unindex.error" => "Failed to delete the index of {0}",
        "recovery.delete.done" => "Recovery point {0} was deleted.",
        "recovery.delete.error" => "Failed to delete {0}",
        "recovery.retain.done" => "Recovery point {0} is now retained permanently.",
        "recovery.release.done" => "Recovery point {0} is no longer retained permanently.",
        "recovery.retain.error" => "Failed to change the retention of {0}",

        _ => return None,
    };
    Some(text)
}

/// Catalog text of `key` with `{n}` replaced by `args[n]`. Unknown keys are
/// returned as is so a missing entry stays visible on the page.
pub fn resource_string(key: &str, args: &[&str]) -> String {
    let Some(text) = catalog(key) else {
        return key.to_string();
    };

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let arg = tail
            .find('}')
            .and_then(|end| tail[1..end].parse::<usize>().ok().map(|i| (i, end)))
            .and_then(|(i, end)| args.get(i).map(|a| (a, end)));
        match arg {
            Some((value, end)) => {
                out.push_str(value);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(
            resource_string("fs.type.shared", &["SAM-QFS", "client"]),
            "SAM-QFS (shared, client)"
        );
        assert_eq!(resource_string("common.yes", &[]), "Yes");
    }

    #[test]
    fn test_unknown_key_is_returned() {
        assert_eq!(resource_string("no.such.key", &["x"]), "no.such.key");
    }

    #[test]
    fn test_missing_argument_kept() {
        assert_eq!(resource_string("error.-2800", &[]), "Cannot connect to {0}.");
    }

    #[test]
    fn test_argument_not_expanded_twice() {
        assert_eq!(
            resource_string("fs.type.shared", &["{1}", "mds"]),
            "{1} (shared, mds)"
        );
    }
}
