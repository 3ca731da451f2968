/// Shared types used across the codebase

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier. Anything below 1 is unauthenticated.
pub type AccountId = i64;

/// Well-known id of the anonymous visitor
pub const GUEST_ACCOUNT: AccountId = 0;

/// Returns true when the id belongs to a logged in account
pub fn is_authenticated(id: AccountId) -> bool {
    id >= 1
}

bitflags! {
    /// Action bitmask carried by a permission grant
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PermissionAction: u8 {
        const READ       = 0b0000_0001;
        const CREATE     = 0b0000_0010;
        const MODIFY     = 0b0000_0100;
        const DELETE     = 0b0000_1000;
        const PERMISSION = 0b0001_0000;

        const ALL = Self::READ.bits()
            | Self::CREATE.bits()
            | Self::MODIFY.bits()
            | Self::DELETE.bits()
            | Self::PERMISSION.bits();
    }
}

bitflags! {
    /// Verb mask a route is registered for. An empty mask matches nothing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(try_from = "VerbSpec", into = "String")]
    pub struct RouteVerb: u8 {
        const GET    = 0b0001;
        const PUT    = 0b0010;
        const SET    = 0b0100;
        const DELETE = 0b1000;

        const ANY = Self::GET.bits() | Self::PUT.bits() | Self::SET.bits() | Self::DELETE.bits();
    }
}

impl RouteVerb {
    /// Route verb and request verb overlap
    pub fn matches(self, other: Self) -> bool {
        self.intersects(other)
    }

    /// Map an HTTP method onto the verb set routes are declared with.
    /// OPTIONS, TRACE, CONNECT and extension methods get the empty mask.
    pub fn from_method(method: &axum::http::Method) -> Self {
        use axum::http::Method;

        match *method {
            Method::GET | Method::HEAD => Self::GET,
            Method::PUT => Self::PUT,
            Method::POST | Method::PATCH => Self::SET,
            Method::DELETE => Self::DELETE,
            _ => Self::empty(),
        }
    }

    /// Parse one verb name as written in a route file
    pub fn parse_name(name: &str) -> Result<Self, String> {
        match name.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::GET),
            "PUT" => Ok(Self::PUT),
            "SET" | "POST" => Ok(Self::SET),
            "DELETE" => Ok(Self::DELETE),
            "ANY" | "*" => Ok(Self::ANY),
            other => Err(format!("unknown route verb '{}'", other)),
        }
    }
}

impl fmt::Display for RouteVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ANY {
            return f.write_str("ANY");
        }
        if self.is_empty() {
            return f.write_str("NONE");
        }

        let names: Vec<&str> = [
            (Self::GET, "GET"),
            (Self::PUT, "PUT"),
            (Self::SET, "SET"),
            (Self::DELETE, "DELETE"),
        ]
        .iter()
        .filter(|(verb, _)| self.contains(*verb))
        .map(|(_, name)| *name)
        .collect();

        f.write_str(&names.join("|"))
    }
}

impl From<RouteVerb> for String {
    fn from(verb: RouteVerb) -> Self {
        verb.to_string()
    }
}

/// Route files may declare one verb or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VerbSpec {
    One(String),
    Many(Vec<String>),
}

impl TryFrom<VerbSpec> for RouteVerb {
    type Error = String;

    fn try_from(spec: VerbSpec) -> Result<Self, Self::Error> {
        match spec {
            VerbSpec::One(name) => name
                .split('|')
                .map(RouteVerb::parse_name)
                .try_fold(RouteVerb::empty(), |acc, verb| verb.map(|v| acc | v)),
            VerbSpec::Many(names) => names
                .iter()
                .map(|name| RouteVerb::parse_name(name))
                .try_fold(RouteVerb::empty(), |acc, verb| verb.map(|v| acc | v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn permission_flags_combine() {
        let rw = PermissionAction::READ | PermissionAction::MODIFY;
        assert!(rw.contains(PermissionAction::READ));
        assert!(rw.contains(PermissionAction::MODIFY));
        assert!(!rw.contains(PermissionAction::DELETE));
        assert!(!rw.contains(PermissionAction::READ | PermissionAction::CREATE));
        assert_eq!(PermissionAction::from_bits_truncate(0xff), PermissionAction::ALL);
    }

    #[test]
    fn verbs_map_from_http_methods() {
        assert_eq!(RouteVerb::from_method(&Method::GET), RouteVerb::GET);
        assert_eq!(RouteVerb::from_method(&Method::POST), RouteVerb::SET);
        assert_eq!(RouteVerb::from_method(&Method::PATCH), RouteVerb::SET);
        assert!(RouteVerb::ANY.matches(RouteVerb::DELETE));
        assert!(!RouteVerb::GET.matches(RouteVerb::PUT));
    }

    #[test]
    fn unknown_methods_match_no_route() {
        for method in [Method::OPTIONS, Method::TRACE, Method::CONNECT] {
            let verb = RouteVerb::from_method(&method);
            assert!(verb.is_empty());
            assert!(!RouteVerb::ANY.matches(verb));
        }

        let purge = Method::from_bytes(b"PURGE").unwrap();
        assert!(!RouteVerb::DELETE.matches(RouteVerb::from_method(&purge)));
        assert_eq!(RouteVerb::from_method(&purge).to_string(), "NONE");
    }

    #[test]
    fn verb_lists_deserialize() {
        let verb: RouteVerb = serde_yaml::from_str("[GET, POST]").unwrap();
        assert_eq!(verb, RouteVerb::GET | RouteVerb::SET);

        let verb: RouteVerb = serde_yaml::from_str("GET|DELETE").unwrap();
        assert_eq!(verb.to_string(), "GET|DELETE");

        assert!(serde_yaml::from_str::<RouteVerb>("FETCH").is_err());
    }

    #[test]
    fn guest_is_not_authenticated() {
        assert!(!is_authenticated(GUEST_ACCOUNT));
        assert!(!is_authenticated(-3));
        assert!(is_authenticated(1));
    }
}
