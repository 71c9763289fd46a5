//! Request commands and their wire serialization
//!
//! The request side of the protocol is a closed set: every command the
//! client can issue is a [`Command`] variant, and [`Command::fragment`]
//! renders it as a `<command xsi:type="...">` fragment. The engine stays
//! ignorant of the concrete shapes; it only ever asks for the fragment.
//! The session envelope and the outer document wrapper are applied by
//! `ocip-client` at send time.

use std::fmt;

use quick_xml::escape::escape;

use crate::digest::signed_password;

/// A request the client can issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// First handshake step; asks the server for a login nonce
    Authentication { user_id: String },
    /// Second handshake step carrying the digest proof
    Login {
        user_id: String,
        signed_password: String,
    },
    /// Parameterless system-level request of the given `xsi:type`
    System { request: String },
    /// User directory search with zero or more criteria
    UserGetList { criteria: Vec<SearchCriteria> },
    /// Request of the given `xsi:type` keyed by a single userId
    UserGet { request: String, user_id: String },
    /// Shared-call-appearance endpoint detail lookup
    ScaGetEndpoint {
        user_id: String,
        device_name: String,
        line_port: String,
    },
}

impl Command {
    pub fn authentication(user_id: impl Into<String>) -> Self {
        Command::Authentication {
            user_id: user_id.into(),
        }
    }

    /// Build the login step, computing the digest proof from the server
    /// nonce and the clear-text password
    pub fn login(user_id: impl Into<String>, password: &str, nonce: &str) -> Self {
        Command::Login {
            user_id: user_id.into(),
            signed_password: signed_password(password, nonce),
        }
    }

    pub fn system(request: impl Into<String>) -> Self {
        Command::System {
            request: request.into(),
        }
    }

    pub fn user_get_list(criteria: Vec<SearchCriteria>) -> Self {
        Command::UserGetList { criteria }
    }

    pub fn user_get(request: impl Into<String>, user_id: impl Into<String>) -> Self {
        Command::UserGet {
            request: request.into(),
            user_id: user_id.into(),
        }
    }

    pub fn sca_endpoint(
        user_id: impl Into<String>,
        device_name: impl Into<String>,
        line_port: impl Into<String>,
    ) -> Self {
        Command::ScaGetEndpoint {
            user_id: user_id.into(),
            device_name: device_name.into(),
            line_port: line_port.into(),
        }
    }

    /// Serialize into a `<command>` protocol fragment, without envelope
    pub fn fragment(&self) -> String {
        match self {
            Command::Authentication { user_id } => command(
                "AuthenticationRequest",
                &element("userId", user_id),
            ),
            Command::Login {
                user_id,
                signed_password,
            } => command(
                "LoginRequest14sp4",
                &format!(
                    "{}{}",
                    element("userId", user_id),
                    element("signedPassword", signed_password)
                ),
            ),
            Command::System { request } => command(request, ""),
            Command::UserGetList { criteria } => {
                let body: String = criteria.iter().map(SearchCriteria::fragment).collect();
                command("UserGetListInSystemRequest", &body)
            }
            Command::UserGet { request, user_id } => command(request, &element("userId", user_id)),
            Command::ScaGetEndpoint {
                user_id,
                device_name,
                line_port,
            } => command(
                "UserSharedCallAppearanceGetEndpointRequest",
                &format!(
                    "{}<accessDeviceEndpoint>{}{}</accessDeviceEndpoint>",
                    element("userId", user_id),
                    element("accessDevice", device_name),
                    element("linePort", line_port)
                ),
            ),
        }
    }
}

fn command(request_type: &str, body: &str) -> String {
    format!(r#"<command xmlns="" xsi:type="{request_type}">{body}</command>"#)
}

fn element(name: &str, value: &str) -> String {
    format!("<{name}>{}</{name}>", escape(value))
}

/// How a search criterion matches its field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    StartsWith,
    Equals,
    Contains,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::StartsWith => "Starts With",
            SearchMode::Equals => "Equals",
            SearchMode::Contains => "Contains",
        })
    }
}

/// Which directory field a search criterion applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    UserId,
    FirstName,
    LastName,
}

impl SearchField {
    fn wire_name(self) -> &'static str {
        match self {
            SearchField::UserId => "UserId",
            SearchField::FirstName => "UserFirstName",
            SearchField::LastName => "UserLastName",
        }
    }
}

/// One criterion of a user directory search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCriteria {
    pub mode: SearchMode,
    pub field: SearchField,
    pub value: String,
    /// Whether the match is case sensitive. On the wire this serializes
    /// as its negation, since the protocol element is `isCaseInsensitive`.
    pub case_sensitive: bool,
}

impl SearchCriteria {
    pub fn new(
        mode: SearchMode,
        field: SearchField,
        value: impl Into<String>,
        case_sensitive: bool,
    ) -> Self {
        SearchCriteria {
            mode,
            field,
            value: value.into(),
            case_sensitive,
        }
    }

    /// Serialize into a `<searchCriteria{Field}>` fragment
    pub fn fragment(&self) -> String {
        let field = self.field.wire_name();
        format!(
            "<searchCriteria{field}>{}{}{}</searchCriteria{field}>",
            element("mode", &self.mode.to_string()),
            element("value", &self.value),
            element("isCaseInsensitive", if self.case_sensitive { "false" } else { "true" }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_fragment() {
        assert_eq!(
            Command::authentication("admin").fragment(),
            r#"<command xmlns="" xsi:type="AuthenticationRequest"><userId>admin</userId></command>"#
        );
    }

    #[test]
    fn test_login_fragment_carries_digest() {
        assert_eq!(
            Command::login("admin", "secret", "12345").fragment(),
            r#"<command xmlns="" xsi:type="LoginRequest14sp4"><userId>admin</userId><signedPassword>af7069e0f784b37f264667e67ecc101f</signedPassword></command>"#
        );
    }

    #[test]
    fn test_system_fragment_is_parameterless() {
        assert_eq!(
            Command::system("SystemSoftwareVersionGetRequest").fragment(),
            r#"<command xmlns="" xsi:type="SystemSoftwareVersionGetRequest"></command>"#
        );
    }

    #[test]
    fn test_search_criteria_fragment() {
        let criteria =
            SearchCriteria::new(SearchMode::StartsWith, SearchField::UserId, "john", true);
        assert_eq!(
            criteria.fragment(),
            "<searchCriteriaUserId><mode>Starts With</mode><value>john</value>\
             <isCaseInsensitive>false</isCaseInsensitive></searchCriteriaUserId>"
        );
    }

    #[test]
    fn test_user_list_fragment_concatenates_criteria() {
        let cmd = Command::user_get_list(vec![SearchCriteria::new(
            SearchMode::Equals,
            SearchField::LastName,
            "Doe",
            false,
        )]);
        assert_eq!(
            cmd.fragment(),
            r#"<command xmlns="" xsi:type="UserGetListInSystemRequest"><searchCriteriaUserLastName><mode>Equals</mode><value>Doe</value><isCaseInsensitive>true</isCaseInsensitive></searchCriteriaUserLastName></command>"#
        );
    }

    #[test]
    fn test_user_get_fragment() {
        assert_eq!(
            Command::user_get("UserServiceGetAssignmentListRequest", "u@example.com").fragment(),
            r#"<command xmlns="" xsi:type="UserServiceGetAssignmentListRequest"><userId>u@example.com</userId></command>"#
        );
    }

    #[test]
    fn test_sca_endpoint_fragment() {
        assert_eq!(
            Command::sca_endpoint("u1", "dev-1", "lp-1").fragment(),
            r#"<command xmlns="" xsi:type="UserSharedCallAppearanceGetEndpointRequest"><userId>u1</userId><accessDeviceEndpoint><accessDevice>dev-1</accessDevice><linePort>lp-1</linePort></accessDeviceEndpoint></command>"#
        );
    }

    #[test]
    fn test_values_are_escaped() {
        assert_eq!(
            Command::authentication("a<b&c").fragment(),
            r#"<command xmlns="" xsi:type="AuthenticationRequest"><userId>a&lt;b&amp;c</userId></command>"#
        );
    }
}
