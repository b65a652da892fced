//! Drive a cold session to the road-wise progress report page.

use crate::config::HarvestConfig;
use crate::error::{RetryError, SessionResult};
use crate::portal;
use crate::session::RemoteSession;
use tracing::{debug, warn};

/// Open the portal and walk the menu to the report page.
///
/// The whole sequence is retried under `config.navigation_retry`. Returns
/// `false` once retries are exhausted; the session should then be abandoned.
pub async fn navigate_to_report(session: &mut dyn RemoteSession, config: &HarvestConfig) -> bool {
    let mut retry = config.navigation_retry.begin("Navigation");
    loop {
        match navigate_once(session, config).await {
            Ok(()) => {
                debug!("reached road wise progress page");
                return true;
            }
            Err(e) => {
                if let Err(err) = retry.failed(e).await {
                    match err {
                        RetryError::Exhausted { attempts, .. } => warn!(
                            "Failed to navigate to road wise progress page after {attempts} attempts."
                        ),
                        RetryError::Fatal(e) => {
                            warn!("Navigation aborted: {e}")
                        }
                    }
                    return false;
                }
            }
        }
    }
}

/// One pass over the menu path, without retries.
pub(crate) async fn navigate_once(
    session: &mut dyn RemoteSession,
    config: &HarvestConfig,
) -> SessionResult<()> {
    let timeout = config.standard_timeout();

    session.open(&config.portal_url).await?;
    session.wait_until_page_ready(timeout).await?;

    session
        .click_when_clickable(&portal::locator(portal::PRIMARY_MENU), timeout)
        .await?;
    session.wait_until_page_ready(timeout).await?;

    session
        .click_when_clickable(&portal::locator(portal::REPORT_MENU_ENTRY), timeout)
        .await?;
    session.wait_until_page_ready(timeout).await?;

    Ok(())
}
