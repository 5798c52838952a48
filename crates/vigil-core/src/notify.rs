// ── Notification engine ──
//
// Turns confirmed state events and downtime events into master and
// contact notifications. A master is created for every PROBLEM and
// RECOVERY and always advances the item's notification number; contact
// notifications are created only for recipients that pass suppression
// and are queued for the transport.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::downtime::DowntimeEvent;
use crate::log::{Entry, EventLog};
use crate::model::{
    Contact, Escalation, ItemKind, ItemRef, MonitoredItem, Notification, NotificationId,
    NotificationKind, NotificationType, SuppressionReason,
};
use crate::registry::Registry;
use crate::state::TransitionEvent;

// ── Contact resolution ──────────────────────────────────────────────

/// A contact selected for one notification number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContact {
    pub contact: Contact,
    pub escalated: bool,
}

/// Source of contacts and escalation rules, owned by configuration.
pub trait ContactDirectory: Send + Sync {
    /// Contacts to notify for `item` at notification `number`.
    fn contacts_for(&self, item: &ItemRef, number: u32) -> Vec<ResolvedContact>;

    fn contact(&self, name: &str) -> Option<&Contact>;
}

#[derive(Debug, Clone, Default)]
struct Route {
    contacts: Vec<String>,
    escalations: Vec<Escalation>,
}

/// In-memory directory built from configuration. Escalations matching the
/// notification number replace the item's own contacts.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    contacts: IndexMap<String, Contact>,
    routes: HashMap<ItemRef, Route>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&mut self, contact: Contact) {
        self.contacts.insert(contact.name.clone(), contact);
    }

    pub fn assign(&mut self, item: ItemRef, contacts: Vec<String>, escalations: Vec<Escalation>) {
        self.routes.insert(
            item,
            Route {
                contacts,
                escalations,
            },
        );
    }

    fn lookup(&self, names: &[String], escalated: bool) -> Vec<ResolvedContact> {
        names
            .iter()
            .filter_map(|name| {
                let found = self.contacts.get(name);
                if found.is_none() {
                    debug!(contact = %name, "unknown contact skipped");
                }
                found
            })
            .map(|contact| ResolvedContact {
                contact: contact.clone(),
                escalated,
            })
            .collect()
    }
}

impl ContactDirectory for StaticDirectory {
    fn contacts_for(&self, item: &ItemRef, number: u32) -> Vec<ResolvedContact> {
        let Some(route) = self.routes.get(item) else {
            return Vec::new();
        };

        let mut escalated: Vec<String> = Vec::new();
        for esc in route.escalations.iter().filter(|e| e.applies_to(number)) {
            for name in &esc.contacts {
                if !escalated.contains(name) {
                    escalated.push(name.clone());
                }
            }
        }

        if escalated.is_empty() {
            self.lookup(&route.contacts, false)
        } else {
            self.lookup(&escalated, true)
        }
    }

    fn contact(&self, name: &str) -> Option<&Contact> {
        self.contacts.get(name)
    }
}

// ── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    /// Contacts (or escalation contacts) for the notification number.
    Current,
    /// Only contacts that received the outstanding problem.
    AlreadyNotified,
}

struct Raise<'a> {
    notification_type: NotificationType,
    number: u32,
    audience: Audience,
    author: Option<&'a str>,
    comment: Option<&'a str>,
}

pub struct NotificationEngine {
    directory: Arc<dyn ContactDirectory>,
    /// Open PROBLEM masters, one per item at most.
    outstanding: IndexMap<ItemRef, Notification>,
    /// Contact notifications not yet handed to the transport.
    queued: Vec<Notification>,
}

impl std::fmt::Debug for NotificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationEngine")
            .field("outstanding", &self.outstanding.len())
            .field("queued", &self.queued.len())
            .finish_non_exhaustive()
    }
}

impl NotificationEngine {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            outstanding: IndexMap::new(),
            queued: Vec::new(),
        }
    }

    /// Queued contact notifications plus outstanding PROBLEM masters,
    /// oldest first.
    pub fn pending_actions(&self) -> Vec<&Notification> {
        let mut all: Vec<&Notification> =
            self.queued.iter().chain(self.outstanding.values()).collect();
        all.sort_by_key(|n| n.created_at);
        all
    }

    /// Hand queued contact notifications over for delivery.
    pub fn take_dispatches(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.queued)
    }

    /// The open PROBLEM master for `item`, if any.
    pub fn outstanding(&self, item: &ItemRef) -> Option<&Notification> {
        self.outstanding.get(item)
    }

    // ── Event entry points ───────────────────────────────────────────

    pub fn on_state_transition(
        &mut self,
        registry: &mut Registry,
        log: &mut EventLog,
        event: &TransitionEvent,
        now: DateTime<Utc>,
    ) {
        if event.raises_problem() {
            self.raise_problem(registry, log, &event.item, now);
        } else if event.raises_recovery() {
            self.raise_recovery(registry, log, &event.item, now);
        }
    }

    /// DOWNTIMESTART / DOWNTIMEEND to the contacts for the current number.
    pub fn on_downtime_event(
        &mut self,
        registry: &mut Registry,
        log: &mut EventLog,
        event: &DowntimeEvent,
        now: DateTime<Utc>,
    ) {
        let item_ref = &event.downtime.item;
        let Some(number) = registry
            .get(item_ref)
            .map(|item| item.current_notification_number)
        else {
            return;
        };
        self.raise(
            registry,
            log,
            item_ref,
            &Raise {
                notification_type: event.kind.notification_type(),
                number,
                audience: Audience::Current,
                author: Some(&event.downtime.author),
                comment: Some(&event.downtime.comment),
            },
            now,
        );
    }

    /// Re-raise outstanding problems whose re-notification time has come.
    pub fn on_time_tick(&mut self, registry: &mut Registry, log: &mut EventLog, now: DateTime<Utc>) {
        let due: Vec<ItemRef> = self
            .outstanding
            .iter()
            .filter(|(_, master)| {
                matches!(
                    master.kind,
                    NotificationKind::Master {
                        next_notification_at: Some(at),
                        ..
                    } if at <= now
                )
            })
            .map(|(item, _)| item.clone())
            .collect();

        for item_ref in due {
            let still_problem = registry
                .get(&item_ref)
                .is_some_and(MonitoredItem::is_hard_problem);
            if still_problem {
                self.raise_problem(registry, log, &item_ref, now);
            } else {
                self.outstanding.shift_remove(&item_ref);
            }
        }
    }

    // ── PROBLEM / RECOVERY ───────────────────────────────────────────

    fn raise_problem(
        &mut self,
        registry: &mut Registry,
        log: &mut EventLog,
        item_ref: &ItemRef,
        now: DateTime<Utc>,
    ) {
        if self.outstanding.shift_remove(item_ref).is_some() {
            debug!(item = %item_ref, "outstanding problem superseded");
        }
        let Some(item) = registry.get_mut(item_ref) else {
            return;
        };
        item.current_notification_number += 1;
        let number = item.current_notification_number;
        let interval = item.notification_interval_secs;

        let master = self.raise(
            registry,
            log,
            item_ref,
            &Raise {
                notification_type: NotificationType::Problem,
                number,
                audience: Audience::Current,
                author: None,
                comment: None,
            },
            now,
        );

        if let Some(mut master) = master {
            if let NotificationKind::Master {
                next_notification_at,
                ..
            } = &mut master.kind
            {
                *next_notification_at = renotify_at(now, interval);
            }
            self.outstanding.insert(item_ref.clone(), master);
        }
    }

    fn raise_recovery(
        &mut self,
        registry: &mut Registry,
        log: &mut EventLog,
        item_ref: &ItemRef,
        now: DateTime<Utc>,
    ) {
        self.outstanding.shift_remove(item_ref);
        let Some(number) = registry
            .get(item_ref)
            .map(|item| item.current_notification_number)
        else {
            return;
        };

        self.raise(
            registry,
            log,
            item_ref,
            &Raise {
                notification_type: NotificationType::Recovery,
                number,
                audience: Audience::AlreadyNotified,
                author: None,
                comment: None,
            },
            now,
        );

        if let Some(item) = registry.get_mut(item_ref) {
            item.current_notification_number = 0;
            item.notified_contacts.clear();
        }
    }

    // ── Fan-out ──────────────────────────────────────────────────────

    /// Create the contact notifications for one raise and, for state
    /// events, their master. Returns the master.
    fn raise(
        &mut self,
        registry: &mut Registry,
        log: &mut EventLog,
        item_ref: &ItemRef,
        raise: &Raise<'_>,
        now: DateTime<Utc>,
    ) -> Option<Notification> {
        let announcement = raise.notification_type.is_downtime_announcement();
        let item = registry.get(item_ref)?;
        let host = item_ref.parent().and_then(|h| registry.get(&h));

        let blocked = if !item.notifications_enabled {
            Some(SuppressionReason::NotificationsDisabled)
        } else if !announcement && item.in_scheduled_downtime() {
            Some(SuppressionReason::Downtime)
        } else {
            None
        };

        let candidates = match (blocked, raise.audience) {
            (Some(_), _) => Vec::new(),
            (None, Audience::Current) => self.directory.contacts_for(item_ref, raise.number),
            (None, Audience::AlreadyNotified) => item
                .notified_contacts
                .iter()
                .filter_map(|name| self.directory.contact(name))
                .map(|contact| ResolvedContact {
                    contact: contact.clone(),
                    escalated: false,
                })
                .collect(),
        };

        let mut excluded = None;
        let recipients: Vec<ResolvedContact> = candidates
            .into_iter()
            .filter(|rc| {
                let reason = if !rc.contact.notifications_enabled {
                    Some(SuppressionReason::NotificationsDisabled)
                } else if !rc.contact.period.contains(now) {
                    Some(SuppressionReason::OutsidePeriod)
                } else {
                    None
                };
                if let Some(reason) = reason {
                    debug!(contact = %rc.contact.name, %reason, "contact excluded");
                    excluded.get_or_insert(reason);
                }
                reason.is_none()
            })
            .collect();

        let master_id = (!announcement).then(NotificationId::new);
        let names: Vec<String> = recipients.iter().map(|rc| rc.contact.name.clone()).collect();
        let macros = Macros::new(item, host, raise.notification_type);
        let env_base = self.base_env(item, host, raise, &names);

        let contacts: Vec<Notification> = recipients
            .iter()
            .map(|rc| {
                let template = match item_ref.kind() {
                    ItemKind::Host => &rc.contact.host_command,
                    ItemKind::Service => &rc.contact.service_command,
                };
                let mut env = env_base.clone();
                env.insert(
                    "NOTIFICATIONISESCALATED".into(),
                    if rc.escalated { "True" } else { "False" }.into(),
                );
                Notification {
                    id: NotificationId::new(),
                    item: item_ref.clone(),
                    notification_type: raise.notification_type,
                    state: item.state,
                    output: item.output.clone(),
                    number: raise.number,
                    created_at: now,
                    author: raise.author.map(str::to_owned),
                    comment: raise.comment.map(str::to_owned),
                    kind: NotificationKind::Contact {
                        master: master_id,
                        contact: rc.contact.name.clone(),
                        command_name: template.name.clone(),
                        command_line: macros.expand(&template.line, &rc.contact.name),
                        env,
                        escalated: rc.escalated,
                    },
                }
            })
            .collect();

        let master = master_id.map(|id| {
            let suppression = blocked.or_else(|| {
                contacts
                    .is_empty()
                    .then(|| excluded.unwrap_or(SuppressionReason::NoContacts))
            });
            Notification {
                id,
                item: item_ref.clone(),
                notification_type: raise.notification_type,
                state: item.state,
                output: item.output.clone(),
                number: raise.number,
                created_at: now,
                author: None,
                comment: None,
                kind: NotificationKind::Master {
                    suppression,
                    contacts: names.clone(),
                    next_notification_at: None,
                },
            }
        });

        if let Some(master) = &master {
            log.record(
                now,
                &Entry::MasterNotification {
                    item: item_ref,
                    notification_type: master.notification_type,
                    number: master.number,
                    suppression: match master.kind {
                        NotificationKind::Master { suppression, .. } => suppression,
                        NotificationKind::Contact { .. } => None,
                    },
                },
            );
        }
        if announcement && contacts.is_empty() {
            debug!(item = %item_ref, notification_type = %raise.notification_type, ?blocked, "announcement reached no contact");
        }
        for n in &contacts {
            if let NotificationKind::Contact {
                contact,
                command_name,
                ..
            } = &n.kind
            {
                log.record(
                    now,
                    &Entry::ContactNotification {
                        item: item_ref,
                        contact,
                        notification_type: n.notification_type,
                        state: n.state,
                        number: n.number,
                        command_name,
                        output: &n.output,
                    },
                );
            }
        }

        if raise.notification_type == NotificationType::Problem {
            if let Some(item) = registry.get_mut(item_ref) {
                item.notified_contacts.extend(names);
            }
        }
        self.queued.extend(contacts);
        master
    }

    fn base_env(
        &self,
        item: &MonitoredItem,
        host: Option<&MonitoredItem>,
        raise: &Raise<'_>,
        recipients: &[String],
    ) -> BTreeMap<String, String> {
        let author = raise.author.unwrap_or_default();
        let (author_name, author_alias) = match self.directory.contact(author) {
            Some(c) => (
                c.name.clone(),
                c.alias.clone().unwrap_or_else(|| c.name.clone()),
            ),
            None if author.is_empty() => (String::new(), String::new()),
            None => ("Not available".to_owned(), "Not available".to_owned()),
        };
        let (host_number, service_number) = match item.kind() {
            ItemKind::Host => (raise.number, raise.number),
            ItemKind::Service => (
                host.map_or(0, |h| h.current_notification_number),
                raise.number,
            ),
        };

        BTreeMap::from([
            ("NOTIFICATIONTYPE".to_owned(), raise.notification_type.to_string()),
            ("NOTIFICATIONRECIPIENTS".to_owned(), recipients.join(",")),
            ("NOTIFICATIONAUTHOR".to_owned(), author.to_owned()),
            ("NOTIFICATIONAUTHORNAME".to_owned(), author_name),
            ("NOTIFICATIONAUTHORALIAS".to_owned(), author_alias),
            (
                "NOTIFICATIONCOMMENT".to_owned(),
                raise.comment.unwrap_or_default().to_owned(),
            ),
            ("HOSTNOTIFICATIONNUMBER".to_owned(), host_number.to_string()),
            (
                "SERVICENOTIFICATIONNUMBER".to_owned(),
                service_number.to_string(),
            ),
        ])
    }
}

fn renotify_at(now: DateTime<Utc>, interval_secs: u64) -> Option<DateTime<Utc>> {
    if interval_secs == 0 {
        return None;
    }
    let delta = i64::try_from(interval_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)?;
    now.checked_add_signed(delta)
}

// ── Macro expansion ─────────────────────────────────────────────────

struct Macros {
    values: Vec<(&'static str, String)>,
}

impl Macros {
    fn new(item: &MonitoredItem, host: Option<&MonitoredItem>, kind: NotificationType) -> Self {
        let (host_state, host_output) = match (item.kind(), host) {
            (ItemKind::Host, _) => (item.state.to_string(), item.output.clone()),
            (ItemKind::Service, Some(h)) => (h.state.to_string(), h.output.clone()),
            (ItemKind::Service, None) => (String::new(), String::new()),
        };
        let (service_state, service_output) = match item.kind() {
            ItemKind::Service => (item.state.to_string(), item.output.clone()),
            ItemKind::Host => (String::new(), String::new()),
        };
        Self {
            values: vec![
                ("$HOSTNAME$", item.item.host_name().to_owned()),
                (
                    "$SERVICEDESC$",
                    item.item.service_name().unwrap_or_default().to_owned(),
                ),
                ("$NOTIFICATIONTYPE$", kind.to_string()),
                ("$HOSTSTATE$", host_state),
                ("$SERVICESTATE$", service_state),
                ("$HOSTOUTPUT$", host_output),
                ("$SERVICEOUTPUT$", service_output),
            ],
        }
    }

    fn expand(&self, template: &str, contact: &str) -> String {
        self.values
            .iter()
            .fold(template.replace("$CONTACTNAME$", contact), |line, (name, value)| {
                line.replace(name, value)
            })
    }
}
