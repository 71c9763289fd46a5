//! High-level provisioning queries built on a session
//!
//! Each function issues one request (or one batch), waits for the reply,
//! and turns protocol-level error replies into real errors. Empty tables
//! come back as empty lists: a table with no entries parses as a missing
//! `row` element.

use std::collections::HashMap;

use anyhow::{bail, Result};
use ocip_client::OciSession;
use ocip_core::{Command, DocumentError, OciDocument, SearchCriteria, SearchField, SearchMode};

/// One table row, keyed by column heading
pub type Row = HashMap<String, String>;

/// Service assignments of one user
#[derive(Debug)]
pub struct UserServices {
    pub service_packs: Vec<Row>,
    pub services: Vec<Row>,
}

fn table_or_empty(doc: &OciDocument, path: &str) -> Result<Vec<Row>> {
    match doc.get_table(path) {
        Ok(rows) => Ok(rows),
        Err(DocumentError::PathNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Software version of the server
pub async fn system_version(session: &OciSession) -> Result<String> {
    let doc = session
        .request(&Command::system("SystemSoftwareVersionGetRequest"))
        .await?;
    Ok(doc.get_str("BroadsoftDocument.command.version")?.to_string())
}

/// Every user in the system directory
pub async fn users(session: &OciSession) -> Result<Vec<Row>> {
    let doc = session
        .request(&Command::system("UserGetListInSystemRequest"))
        .await?;
    table_or_empty(&doc, "BroadsoftDocument.command.userTable")
}

/// First directory entry whose user id starts with the given prefix
pub async fn find_user(session: &OciSession, user_id: &str) -> Result<Row> {
    let command = Command::user_get_list(vec![SearchCriteria::new(
        SearchMode::StartsWith,
        SearchField::UserId,
        user_id,
        true,
    )]);
    let doc = session.request(&command).await?;
    let mut rows = table_or_empty(&doc, "BroadsoftDocument.command.userTable")?;
    if rows.is_empty() {
        bail!("no user found: {user_id}");
    }
    Ok(rows.remove(0))
}

/// Shared-call-appearance endpoints of one user
pub async fn sca_endpoints(session: &OciSession, user_id: &str) -> Result<Vec<Row>> {
    let doc = session
        .request(&Command::user_get(
            "UserSharedCallAppearanceGetRequest16sp2",
            user_id,
        ))
        .await?;
    table_or_empty(&doc, "BroadsoftDocument.command.endpointTable")
}

/// Detail lookup for a set of SCA endpoints, batched into one message
///
/// Returns the raw reply document: the server answers the whole batch
/// with one document holding one command element per endpoint.
pub async fn sca_endpoint_details(
    session: &OciSession,
    user_id: &str,
    endpoints: &[Row],
) -> Result<Option<OciDocument>> {
    if endpoints.is_empty() {
        return Ok(None);
    }
    let commands: Vec<Command> = endpoints
        .iter()
        .map(|e| {
            Command::sca_endpoint(
                user_id,
                e.get("Device Name").map(String::as_str).unwrap_or(""),
                e.get("Line Port").map(String::as_str).unwrap_or(""),
            )
        })
        .collect();
    let doc = session.request_all(&commands).await?;
    Ok(Some(doc))
}

/// Service packs and individual services assigned to one user
pub async fn user_services(session: &OciSession, user_id: &str) -> Result<UserServices> {
    let doc = session
        .request(&Command::user_get(
            "UserServiceGetAssignmentListRequest",
            user_id,
        ))
        .await?;
    Ok(UserServices {
        service_packs: table_or_empty(&doc, "BroadsoftDocument.command.servicePacksAssignmentTable")?,
        services: table_or_empty(&doc, "BroadsoftDocument.command.userServicesAssignmentTable")?,
    })
}
