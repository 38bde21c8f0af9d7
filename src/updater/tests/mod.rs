use super::test_helpers::*;
use super::*;
use crate::error::{Error, TransferError};
use crate::state::{CachedFile, ProgressCache};
use crate::types::{UpdateOutcome, UpdateSummary};
use tempfile::tempdir;


fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

/// Check, then initialize against the published pointer
async fn initialize(harness: &Harness, pointer_url: &str) -> UpdateSummary {
    let check = harness.updater.check_for_updates(pointer_url).await.unwrap();
    harness.updater.initialize_update(&check, false).await.unwrap()
}
