//! Browser session abstraction and the login sequence.

use std::future::Future;

use crate::error::Result;
use crate::types::Credentials;

use super::home_url;

/// Account menu link on the home page
pub const ACCOUNT_LINK: &str = "#nav-link-accountList";
/// Email / phone input on the sign-in page
pub const EMAIL_INPUT: &str = "#ap_email";
/// Button that advances from the email step to the password step
pub const CONTINUE_BUTTON: &str = "#continue";
/// Password input
pub const PASSWORD_INPUT: &str = "#ap_password";
/// Final sign-in button
pub const SIGN_IN_SUBMIT: &str = "#signInSubmit";

/// A stateful automation handle (one browser with its own cookie jar).
///
/// Element lookups that find nothing return
/// [`HarvestError::StructureMismatch`](crate::error::HarvestError::StructureMismatch);
/// navigation and content failures return
/// [`HarvestError::Fetch`](crate::error::HarvestError::Fetch).
pub trait Session {
    /// Navigate the session to `url` and wait for it to settle
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<()>>;

    /// Current page HTML
    fn html(&mut self) -> impl Future<Output = Result<String>>;

    /// Click the first element matching `selector`
    fn click(&mut self, selector: &str) -> impl Future<Output = Result<()>>;

    /// Type `text` into the first element matching `selector`
    fn fill(&mut self, selector: &str, text: &str) -> impl Future<Output = Result<()>>;

    /// Terminate the session
    fn close(self) -> impl Future<Output = Result<()>>
    where
        Self: Sized;

    /// Navigate to `url` and return the rendered HTML
    fn fetch_page(&mut self, url: &str) -> impl Future<Output = Result<String>> {
        async move {
            self.navigate(url).await?;
            self.html().await
        }
    }
}

/// Run one pass of the sign-in sequence.
///
/// Any missing element aborts the pass; the caller decides whether to retry.
pub async fn login<S: Session>(session: &mut S, credentials: &Credentials) -> Result<()> {
    session.navigate(&home_url()).await?;
    session.click(ACCOUNT_LINK).await?;
    session.fill(EMAIL_INPUT, &credentials.email).await?;
    session.click(CONTINUE_BUTTON).await?;
    session.fill(PASSWORD_INPUT, &credentials.password).await?;
    session.click(SIGN_IN_SUBMIT).await?;
    Ok(())
}
