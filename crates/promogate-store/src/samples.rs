//! Sample proposals for trying the pipeline on an empty inbox.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::StoreError;

const SAMPLES: &[(&str, &str)] = &[
    (
        "PRJ-PIPELINE-PASS_v1.md",
        "# PASS sample
approval_id: APR-1001
approved_by: owner_min
approved_at: 2026-02-28T00:00:00Z
approval_reason: approved_for_pipeline_pass_sample
EVIDENCE: command logs attached
EVAL: goal met
LEARN: keep this format
success_rate: 95%
drift: 3%
reproducibility: 100%
revenue_usdc: 3.0
token_cost_usdc: 0.5
",
    ),
    (
        "PRJ-PIPELINE-FAIL-MISSING_v1.md",
        "# FAIL sample
approval_id: APR-1002
EVIDENCE: exists
success_rate: 92%
drift: 4%
reproducibility: 100%
",
    ),
    (
        "PRJ-PIPELINE-FAIL-KPI_v1.md",
        "# KPI fail sample
approval_id: APR-1003
EVIDENCE: exists
EVAL: exists
LEARN: exists
success_rate: 70%
drift: 25%
reproducibility: 60%
revenue_usdc: 2.0
token_cost_usdc: 1.8
",
    ),
];

/// Write the sample proposals into `inbox`, skipping any that already exist.
///
/// Returns the number of files written.
pub fn seed_samples(inbox: &Path) -> Result<usize, StoreError> {
    fs::create_dir_all(inbox).map_err(StoreError::io("creating", inbox))?;
    let mut written = 0;
    for (name, content) in SAMPLES {
        let path = inbox.join(name);
        if path.exists() {
            continue;
        }
        fs::write(&path, content).map_err(StoreError::io("writing", &path))?;
        written += 1;
    }
    info!(inbox = %inbox.display(), written, "seeded sample proposals");
    Ok(written)
}
