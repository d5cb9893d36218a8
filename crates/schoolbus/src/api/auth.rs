//! Login endpoints.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::ApiClient;
use crate::error::Result;
use crate::models::{Student, User};
use crate::session::Session;

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QrCredentials<'a> {
    qr_code: &'a str,
}

#[derive(Debug, Deserialize)]
struct StaffLogin {
    token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct GuardianLogin {
    token: String,
    student: Student,
}

impl ApiClient {
    /// Log in as a driver.
    ///
    /// The returned session is already attached to this client.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rejected`] or an API error on bad credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        self.staff_login(&["auth", "login"], email, password).await
    }

    /// Log in as an administrator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rejected`] or an API error on bad credentials.
    pub async fn admin_login(&self, email: &str, password: &str) -> Result<Session> {
        self.staff_login(&["auth", "admin", "login"], email, password)
            .await
    }

    async fn staff_login(&self, path: &[&str], email: &str, password: &str) -> Result<Session> {
        let login: StaffLogin = self.post(path, &Credentials { email, password }).await?;
        let session = Session::staff(login.token, login.user);
        self.set_session(Some(&session));
        info!(role = %session.role(), "Logged in as {}", session.describe());
        Ok(session)
    }

    /// Log in as a parent using the child's QR code.
    ///
    /// # Errors
    ///
    /// Returns an API error if the code does not belong to an active student.
    pub async fn parent_login(&self, qr_code: &str) -> Result<Session> {
        let login: GuardianLogin = self
            .post(
                &["auth", "parent", "login"],
                &QrCredentials {
                    qr_code: qr_code.trim(),
                },
            )
            .await?;
        let session = Session::guardian(login.token, login.student);
        self.set_session(Some(&session));
        info!("Logged in as {}", session.describe());
        Ok(session)
    }

    /// End the server-side session and detach the token.
    ///
    /// # Errors
    ///
    /// Returns the API error, after detaching the token regardless.
    pub async fn logout(&self) -> Result<()> {
        let result = self.post_empty(&["auth", "logout"]).await;
        self.set_session(None);
        result
    }

    /// The account behind the current token.
    ///
    /// # Errors
    ///
    /// Returns an API error; 401 when the token is missing or expired.
    pub async fn me(&self) -> Result<User> {
        self.get(&["auth", "me"]).await
    }
}
