//! Single-shot response slots
//!
//! Every send returns a [`ResponsePromise`]: the caller's end of a oneshot
//! channel that the background reader fulfills with the parsed response
//! document, plus a copy of the outgoing request text for diagnostics.

use ocip_core::OciDocument;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Pending response for one issued request
#[derive(Debug)]
pub struct ResponsePromise {
    slot: oneshot::Receiver<OciDocument>,
    request: String,
}

impl ResponsePromise {
    pub(crate) fn new(slot: oneshot::Receiver<OciDocument>, request: String) -> Self {
        ResponsePromise { slot, request }
    }

    /// The request text this promise was issued for
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Wait for the response document
    ///
    /// Resolves once the background reader delivers the correlated inbound
    /// message. If the connection dies first, the slot is dropped and this
    /// returns [`Error::ConnectionClosed`] instead of blocking forever.
    pub async fn response(self) -> Result<OciDocument> {
        self.slot.await.map_err(|_| Error::ConnectionClosed)
    }
}
