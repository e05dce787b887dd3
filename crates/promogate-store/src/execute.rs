//! Applying decisions: file moves, incident records, summary artifacts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use promogate_core::{Action, Decision, DecisionRecord, Directories, RunMode, RunSummary};
use tracing::{info, warn};

use crate::StoreError;
use crate::stamp::RunClock;

/// Applies decisions for one run.
///
/// In dry-run mode nothing is moved or written; records still report the
/// destination and the incident path that would have been written.
pub struct Executor<'a> {
    dirs: &'a Directories,
    mode: RunMode,
    clock: RunClock,
}

impl<'a> Executor<'a> {
    pub fn new(dirs: &'a Directories, mode: RunMode, clock: RunClock) -> Self {
        Self { dirs, mode, clock }
    }

    /// Create the inbox, destination, and log directories.
    ///
    /// The incidents directory is created lazily by the first incident.
    pub fn prepare_dirs(&self) -> Result<(), StoreError> {
        for dir in [
            &self.dirs.inbox,
            &self.dirs.applied,
            &self.dirs.demoted,
            &self.dirs.log,
        ] {
            fs::create_dir_all(dir).map_err(StoreError::io("creating", dir))?;
        }
        Ok(())
    }

    /// Where a decision sends its file. `Hold` leaves it in place.
    pub fn destination(&self, decision: &Decision) -> PathBuf {
        let source = decision.source_path();
        let name = match source.file_name() {
            Some(name) => name.to_os_string(),
            None => decision.file_name().into(),
        };
        match decision.action {
            Action::Promote => self.dirs.applied.join(name),
            Action::Demote => self.dirs.demoted.join(name),
            Action::Hold => source.to_path_buf(),
        }
    }

    pub fn incident_path(&self, decision: &Decision) -> PathBuf {
        self.dirs.incidents.join(format!(
            "INC-{}-{}.md",
            self.clock.stamp(),
            decision.file_stem()
        ))
    }

    /// Move the file and, if it was flagged, record an incident.
    ///
    /// A flagged file gets an incident whatever its final action, so a
    /// promotion forced by the policy gate still leaves an audit trail.
    pub fn apply(&self, decision: Decision) -> Result<DecisionRecord, StoreError> {
        let destination = self.destination(&decision);
        if !self.mode.is_dry_run() && decision.action != Action::Hold {
            move_file(decision.source_path(), &destination)?;
            info!(
                file = %decision.file_name(),
                action = %decision.action,
                to = %destination.display(),
                "moved proposal"
            );
        }

        let incident = if decision.reasons.is_empty() {
            None
        } else {
            let path = self.incident_path(&decision);
            if !self.mode.is_dry_run() {
                self.write_incident(&path, &decision)?;
            }
            Some(path.display().to_string())
        };

        Ok(DecisionRecord {
            decision,
            destination: destination.display().to_string(),
            incident,
        })
    }

    fn write_incident(&self, path: &Path, decision: &Decision) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dirs.incidents)
            .map_err(StoreError::io("creating", &self.dirs.incidents))?;
        let body = render_incident(decision, &self.clock, self.mode.is_dry_run())?;
        fs::write(path, body).map_err(StoreError::io("writing", path))?;
        warn!(
            file = %decision.file_name(),
            reasons = %decision.reasons.join(","),
            incident = %path.display(),
            "incident recorded"
        );
        Ok(())
    }
}

/// Markdown body of an incident record.
pub fn render_incident(
    decision: &Decision,
    clock: &RunClock,
    dry_run: bool,
) -> Result<String, StoreError> {
    let kpi = serde_json::to_string(&decision.kpi)?;
    Ok(format!(
        "# INCIDENT\n\n\
         - time_utc: {}\n\
         - file: {}\n\
         - action: {}\n\
         - reasons: {}\n\
         - kpi: {}\n\
         - age_hours: {:.2}\n\
         - dry_run: {}\n",
        clock.time_utc(),
        decision.file,
        decision.action,
        decision.reasons.join(", "),
        kpi,
        decision.age_hours,
        dry_run,
    ))
}

/// Rename, falling back to copy-and-remove across filesystems.
fn move_file(from: &Path, to: &Path) -> Result<(), StoreError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(StoreError::io("copying", from))?;
            fs::remove_file(from).map_err(StoreError::io("removing", from))
        }
        Err(e) => Err(StoreError::Io {
            action: "moving",
            path: from.to_path_buf(),
            source: e,
        }),
    }
}

/// Persist the run summary as pretty JSON and return its path.
pub fn write_summary(
    log_dir: &Path,
    summary: &RunSummary,
    clock: &RunClock,
) -> Result<PathBuf, StoreError> {
    let kind = if summary.dry_run { "dryrun" } else { "run" };
    let path = log_dir.join(format!("pipeline_manager_{kind}_{}.json", clock.stamp()));
    let json = serde_json::to_string_pretty(summary)?;
    fs::create_dir_all(log_dir).map_err(StoreError::io("creating", log_dir))?;
    fs::write(&path, json).map_err(StoreError::io("writing", &path))?;
    info!(path = %path.display(), "wrote run summary");
    Ok(path)
}
