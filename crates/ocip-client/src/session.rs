//! Sessions and the login handshake
//!
//! A session binds a connection to a session identifier that the server
//! uses to scope commands; every sessioned send wraps its fragments in a
//! `<sessionId>` element. The identifier is a random decimal string,
//! unique by convention only, drawn from the process-wide RNG.

use ocip_core::{Command, OciDocument};
use rand::Rng;
use tracing::debug;

use crate::connection::OciConnection;
use crate::error::{Error, Result};
use crate::promise::ResponsePromise;

/// Path of the login nonce in the authentication reply
const NONCE_PATH: &str = "BroadsoftDocument.command.nonce";

/// A session on an established connection
///
/// Holds a shared handle to the connection; closing the connection
/// invalidates the session, which has no teardown of its own.
#[derive(Debug, Clone)]
pub struct OciSession {
    conn: OciConnection,
    session_id: String,
}

impl OciSession {
    /// Create a session with a fresh random identifier
    pub fn new(conn: &OciConnection) -> Self {
        let id: u32 = rand::thread_rng().gen_range(0..99_999_999);
        OciSession {
            conn: conn.clone(),
            session_id: id.to_string(),
        }
    }

    /// Identifier embedded in every sessioned command
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send one command under this session
    pub async fn send_command(&self, command: &Command) -> Result<ResponsePromise> {
        self.conn
            .send(&format!("{}{}", self.wrapper(), command.fragment()))
            .await
    }

    /// Send several commands as one message
    ///
    /// The fragments are concatenated under a single session wrapper; the
    /// server answers the whole batch with one reply document.
    pub async fn send_commands(&self, commands: &[Command]) -> Result<ResponsePromise> {
        let body: String = commands.iter().map(Command::fragment).collect();
        self.conn
            .send(&format!("{}{}", self.wrapper(), body))
            .await
    }

    /// Send one command and wait for its reply
    ///
    /// Error-tagged replies surface as [`Error::Protocol`] carrying the
    /// server's code and summary.
    pub async fn request(&self, command: &Command) -> Result<OciDocument> {
        let doc = self.send_command(command).await?.response().await?;
        if doc.is_error() {
            return Err(doc.error_details()?.into());
        }
        Ok(doc)
    }

    /// Send several commands as one message and wait for the batched reply
    ///
    /// The server answers the whole batch with one document; an error-tagged
    /// reply fails the batch as a whole.
    pub async fn request_all(&self, commands: &[Command]) -> Result<OciDocument> {
        let doc = self.send_commands(commands).await?.response().await?;
        if doc.is_error() {
            return Err(doc.error_details()?.into());
        }
        Ok(doc)
    }

    fn wrapper(&self) -> String {
        format!(r#"<sessionId xmlns="">{}</sessionId>"#, self.session_id)
    }
}

impl OciConnection {
    /// Establish a session by running the login handshake
    ///
    /// Two steps: an `AuthenticationRequest` naming the user yields a
    /// nonce, then a `LoginRequest` proves knowledge of the password with
    /// the digest of nonce and hashed password. A server error reply on
    /// the login step surfaces as [`Error::LoginFailed`] with the server's
    /// summary.
    pub async fn start_session(&self, user_id: &str, password: &str) -> Result<OciSession> {
        let session = OciSession::new(self);

        let promise = session
            .send_command(&Command::authentication(user_id))
            .await?;
        let reply = promise.response().await?;
        let nonce = reply
            .get_str(NONCE_PATH)
            .map_err(Error::MissingNonce)?
            .to_string();

        let promise = session
            .send_command(&Command::login(user_id, password, &nonce))
            .await?;
        let reply = promise.response().await?;
        if reply.is_error() {
            let summary = reply
                .error_summary()
                .unwrap_or("login rejected")
                .to_string();
            return Err(Error::LoginFailed { summary });
        }

        debug!(session_id = %session.session_id(), user = %user_id, "session established");
        Ok(session)
    }
}
