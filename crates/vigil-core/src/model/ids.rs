// ── Core identity types ──
//
// Downtimes, comments and notifications are addressed by UUID-backed
// newtypes. Monitored items are addressed by `ItemRef`, which carries
// the host/service tag alongside the names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(
    /// Identity of a scheduled downtime.
    DowntimeId
);
uuid_id!(
    /// Identity of a comment attached to a monitored item.
    CommentId
);
uuid_id!(
    /// Identity of a master or contact notification.
    NotificationId
);

// ── ItemKind / ItemRef ──────────────────────────────────────────────

/// Host or service tag of a monitored item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemKind {
    Host,
    Service,
}

/// Identity of a monitored item.
///
/// Services are addressed through their host, matching the external
/// command grammar (`<host>;<service>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ItemRef {
    Host { host: String },
    Service { host: String, service: String },
}

impl ItemRef {
    pub fn host(name: impl Into<String>) -> Self {
        Self::Host { host: name.into() }
    }

    pub fn service(host: impl Into<String>, service: impl Into<String>) -> Self {
        Self::Service {
            host: host.into(),
            service: service.into(),
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Host { .. } => ItemKind::Host,
            Self::Service { .. } => ItemKind::Service,
        }
    }

    pub fn host_name(&self) -> &str {
        match self {
            Self::Host { host } | Self::Service { host, .. } => host,
        }
    }

    pub fn service_name(&self) -> Option<&str> {
        match self {
            Self::Host { .. } => None,
            Self::Service { service, .. } => Some(service),
        }
    }

    /// The host item a service depends on. `None` for hosts.
    pub fn parent(&self) -> Option<ItemRef> {
        match self {
            Self::Host { .. } => None,
            Self::Service { host, .. } => Some(Self::host(host.clone())),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host { host } => write!(f, "{host}"),
            Self::Service { host, service } => write!(f, "{host};{service}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn downtime_id_parses_its_display_form() {
        let id = DowntimeId::new();
        let parsed: DowntimeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn downtime_id_rejects_garbage() {
        assert!("not-a-uuid".parse::<DowntimeId>().is_err());
    }

    #[test]
    fn item_ref_display_matches_log_format() {
        assert_eq!(ItemRef::host("web01").to_string(), "web01");
        assert_eq!(ItemRef::service("web01", "http").to_string(), "web01;http");
    }

    #[test]
    fn service_parent_is_its_host() {
        let svc = ItemRef::service("web01", "http");
        assert_eq!(svc.parent(), Some(ItemRef::host("web01")));
        assert_eq!(svc.kind(), ItemKind::Service);
        assert!(ItemRef::host("web01").parent().is_none());
    }

    #[test]
    fn item_ref_serializes_with_kind_tag() {
        let json = serde_json::to_value(ItemRef::service("h", "s")).unwrap();
        assert_eq!(json["kind"], "service");
        assert_eq!(json["service"], "s");
    }
}
