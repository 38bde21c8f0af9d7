//! Installed-version record
//!
//! Layout: `i32` component count, then that many `u32` components.

use super::{Decoder, Encoder, corrupt, read_optional, write_replacing};
use crate::error::Result;
use crate::version::Version;
use std::path::Path;

/// Read the installed version; `None` when no record exists yet
pub async fn load(path: &Path) -> Result<Option<Version>> {
    let Some(bytes) = read_optional(path).await? else {
        return Ok(None);
    };
    decode(&bytes).map(Some).map_err(|reason| corrupt(path, reason))
}

/// Record `version` as installed
pub async fn save(path: &Path, version: &Version) -> Result<()> {
    write_replacing(path, &encode(version)).await?;
    tracing::debug!(%version, path = %path.display(), "installed version recorded");
    Ok(())
}

fn encode(version: &Version) -> Vec<u8> {
    let mut enc = Encoder::default();
    let numbers = version.numbers();
    enc.i32(i32::try_from(numbers.len()).unwrap_or(i32::MAX));
    for n in numbers {
        enc.u32(*n);
    }
    enc.finish()
}

fn decode(bytes: &[u8]) -> std::result::Result<Version, String> {
    let mut dec = Decoder::new(bytes);
    let count = dec.count()?;
    let numbers = (0..count)
        .map(|_| dec.u32())
        .collect::<std::result::Result<Vec<_>, _>>()?;
    dec.finish()?;
    Ok(Version::from(numbers))
}
