//! Version pointer lookup.

use crate::error::Result;
use crate::types::UpdateCheck;

use super::Updater;

impl Updater {
    /// Fetch the version pointer document and compare it with the installed version
    ///
    /// Does not touch disk or emit events. The returned [`UpdateCheck`] is the
    /// input to [`initialize_update`](Self::initialize_update).
    pub async fn check_for_updates(&self, url: &str) -> Result<UpdateCheck> {
        let text = self.components.source.fetch_text(url).await?;
        let pointer = self.components.decoder.decode_pointer(&text)?;

        let installed = self.installed_version();
        let update_available = installed < pointer.latest_version;

        tracing::info!(
            %installed,
            latest = %pointer.latest_version,
            update_available,
            "checked for updates"
        );

        Ok(UpdateCheck {
            latest_version: pointer.latest_version,
            chain_entry_url: pointer.chain_entry_url,
            update_available,
        })
    }
}
