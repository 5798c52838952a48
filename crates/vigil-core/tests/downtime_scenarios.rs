#![allow(clippy::unwrap_used)]
// End-to-end scenarios driving the `Engine` with explicit timestamps.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use pretty_assertions::assert_eq;

use vigil_core::{
    CommandTemplate, Contact, CoreError, Downtime, DowntimeId, Engine, HostState, ItemRef,
    ItemSettings, LogLevel, NotificationType, Outcome, Registry, ServiceState, State,
    StaticDirectory, TimePeriod,
};

// ── Helpers ─────────────────────────────────────────────────────────

const NOW: i64 = 1_527_877_800;

fn at(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(NOW + offset, 0).unwrap()
}

fn host() -> ItemRef {
    ItemRef::host("test_host_0")
}

fn svc() -> ItemRef {
    ItemRef::service("test_host_0", "test_ok_0")
}

fn test_contact() -> Contact {
    Contact {
        name: "test_contact".into(),
        alias: Some("Test Contact".into()),
        notifications_enabled: true,
        period: TimePeriod::Always,
        host_command: CommandTemplate {
            name: "notify-host".into(),
            line: "notify-host $NOTIFICATIONTYPE$ $HOSTNAME$ $HOSTSTATE$".into(),
        },
        service_command: CommandTemplate {
            name: "notify-service".into(),
            line: "notify-service $NOTIFICATIONTYPE$ $HOSTNAME$ $SERVICEDESC$ $SERVICESTATE$"
                .into(),
        },
    }
}

/// Host `test_host_0` with service `test_ok_0`, both needing two
/// consecutive problems to confirm, both notifying `test_contact`.
fn engine() -> Engine {
    let settings = ItemSettings {
        max_attempts: 2,
        ..ItemSettings::default()
    };
    let mut registry = Registry::new();
    registry.insert(host(), &settings);
    registry.insert(svc(), &settings);

    let mut directory = StaticDirectory::new();
    directory.add_contact(test_contact());
    directory.assign(host(), vec!["test_contact".into()], Vec::new());
    directory.assign(svc(), vec!["test_contact".into()], Vec::new());

    Engine::new(registry, Arc::new(directory))
}

fn svc_state(engine: &mut Engine, state: ServiceState, output: &str, offset: i64) {
    engine
        .process_check_result(&svc(), State::Service(state), output, at(offset))
        .unwrap();
    assert_consistent(engine);
}

fn host_state(engine: &mut Engine, state: HostState, output: &str, offset: i64) {
    engine
        .process_check_result(&host(), State::Host(state), output, at(offset))
        .unwrap();
    assert_consistent(engine);
}

fn command(engine: &mut Engine, line: &str, offset: i64) -> Outcome {
    let outcome = engine.process_command(line, at(offset)).unwrap();
    assert_consistent(engine);
    outcome
}

fn schedule(engine: &mut Engine, line: &str, offset: i64) -> DowntimeId {
    match command(engine, line, offset) {
        Outcome::DowntimeScheduled { id } => id,
        other => panic!("expected a scheduled downtime, got {other:?}"),
    }
}

/// `in_scheduled_downtime` agrees with the depth and with the number of
/// active downtimes on every item.
fn assert_consistent(engine: &Engine) {
    for item in engine.registry().items() {
        let active = item.downtimes.values().filter(|d| d.is_in_effect).count();
        assert_eq!(
            item.in_scheduled_downtime(),
            item.scheduled_downtime_depth() > 0
        );
        assert_eq!(
            usize::try_from(item.scheduled_downtime_depth()).unwrap(),
            active,
            "depth of {} out of sync",
            item.item
        );
        assert_eq!(item.comments.len(), active);
    }
}

/// `(type, is_master, suppressed)` of every pending action.
fn actions(engine: &Engine) -> Vec<(NotificationType, bool, bool)> {
    engine
        .pending_actions()
        .into_iter()
        .map(|n| (n.notification_type, n.is_master(), n.suppressed()))
        .collect()
}

fn assert_logged(engine: &Engine, level: LogLevel, message: &str) {
    let entries = engine.log().entries();
    assert!(
        entries.iter().any(|(l, m)| *l == level && *m == message),
        "missing ({level}, {message}) in:\n{entries:#?}"
    );
}

fn assert_not_logged(engine: &Engine, fragment: &str) {
    assert!(
        engine.log().filter(None, Some(fragment)).is_empty(),
        "unexpected '{fragment}' in log"
    );
}

// ── Fixed downtime ──────────────────────────────────────────────────

#[test]
fn test_fixed_service_downtime() {
    let mut engine = engine();
    svc_state(&mut engine, ServiceState::Ok, "OK", 0);

    let line = format!(
        "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;0;900;admin;maintenance",
        NOW + 900
    );
    let id = schedule(&mut engine, &line, 0);

    let item = engine.item(&svc()).unwrap();
    assert_eq!(engine.downtimes().len(), 1);
    assert_eq!(item.scheduled_downtime_depth(), 1);
    assert_eq!(item.comments.len(), 1);
    let dt = engine.downtime(&id).unwrap();
    assert!(dt.fixed && dt.is_in_effect && dt.has_been_triggered);
    assert_eq!(dt.duration_secs, 900);
    assert_eq!(actions(&engine), vec![(NotificationType::DowntimeStart, false, false)]);

    assert_logged(&engine, LogLevel::Info, &format!("EXTERNAL COMMAND: {line}"));
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE DOWNTIME ALERT: test_host_0;test_ok_0;STARTED; \
         Service has entered a period of scheduled downtime",
    );
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE NOTIFICATION: test_contact;test_host_0;test_ok_0;DOWNTIMESTART (OK);0;notify-service;OK",
    );

    // Two problems confirm the CRITICAL; the PROBLEM master is muted.
    svc_state(&mut engine, ServiceState::Critical, "BAD", 1);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 2);
    assert_eq!(
        actions(&engine),
        vec![
            (NotificationType::DowntimeStart, false, false),
            (NotificationType::Problem, true, true),
        ]
    );
    assert_eq!(engine.item(&svc()).unwrap().current_notification_number, 1);
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE NOTIFICATION MASTER: test_host_0;test_ok_0;PROBLEM;1;SUPPRESSED (downtime)",
    );
    assert_logged(
        &engine,
        LogLevel::Error,
        "SERVICE ALERT: test_host_0;test_ok_0;CRITICAL;HARD;2;BAD",
    );

    // Window over: expiry, then recovery.
    svc_state(&mut engine, ServiceState::Ok, "OK", 901);
    let item = engine.item(&svc()).unwrap();
    assert!(engine.downtimes().is_empty());
    assert!(item.comments.is_empty());
    assert_eq!(item.scheduled_downtime_depth(), 0);
    assert_eq!(item.current_notification_number, 0);
    assert_eq!(
        actions(&engine),
        vec![
            (NotificationType::DowntimeStart, false, false),
            (NotificationType::DowntimeEnd, false, false),
        ]
    );
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE DOWNTIME ALERT: test_host_0;test_ok_0;STOPPED; \
         Service has exited from a period of scheduled downtime",
    );
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE NOTIFICATION: test_contact;test_host_0;test_ok_0;DOWNTIMEEND (CRITICAL);1;notify-service;BAD",
    );

    // Out of downtime a new problem reaches the contact.
    engine.take_dispatches();
    svc_state(&mut engine, ServiceState::Critical, "BAD", 902);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 903);
    assert_eq!(
        actions(&engine),
        vec![
            (NotificationType::Problem, false, false),
            (NotificationType::Problem, true, false),
        ]
    );
    let sent = engine.take_dispatches();
    assert_eq!(
        sent[0].command_line(),
        Some("notify-service PROBLEM test_host_0 test_ok_0 CRITICAL")
    );
    assert_logged(
        &engine,
        LogLevel::Error,
        "SERVICE NOTIFICATION: test_contact;test_host_0;test_ok_0;CRITICAL;1;notify-service;BAD",
    );
}

#[test]
fn test_fixed_downtime_in_future_waits_for_its_window() {
    let mut engine = engine();
    let line = format!(
        "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{};{};1;;0;admin;later",
        NOW + 60,
        NOW + 120
    );
    let id = schedule(&mut engine, &line, 0);
    assert!(engine.downtime(&id).unwrap().is_pending());
    assert!(actions(&engine).is_empty());

    engine.tick(at(59));
    assert!(!engine.item(&host()).unwrap().in_scheduled_downtime());

    engine.tick(at(60));
    assert!(engine.item(&host()).unwrap().in_scheduled_downtime());
    assert_logged(
        &engine,
        LogLevel::Info,
        "HOST DOWNTIME ALERT: test_host_0;STARTED; Host has entered a period of scheduled downtime",
    );
}

#[test]
fn test_expiry_wins_over_activation() {
    let mut engine = engine();
    let line = format!(
        "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{};{};1;0;0;admin;missed",
        NOW + 10,
        NOW + 20
    );
    schedule(&mut engine, &line, 0);

    // First sweep after scheduling lands exactly on the end.
    engine.tick(at(20));
    assert!(engine.downtimes().is_empty());
    assert_not_logged(&engine, "DOWNTIME ALERT");
    assert!(actions(&engine).is_empty());
}

#[test]
fn test_simultaneous_activation_follows_entry_order() {
    let mut engine = engine();
    let line = |tag: &str| {
        format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{};{};1;0;0;admin;{tag}",
            NOW + 10,
            NOW + 100
        )
    };
    let first = schedule(&mut engine, &line("first"), 0);
    let second = schedule(&mut engine, &line("second"), 1);

    engine.tick(at(10));
    let item = engine.item(&svc()).unwrap();
    assert_eq!(item.scheduled_downtime_depth(), 2);
    let comment_order: Vec<_> = item.comments.keys().copied().collect();
    assert_eq!(
        comment_order,
        vec![
            engine.downtime(&first).unwrap().comment_id.unwrap(),
            engine.downtime(&second).unwrap().comment_id.unwrap(),
        ]
    );
}

// ── Flexible downtime ───────────────────────────────────────────────

#[test]
fn test_flexible_service_downtime() {
    let mut engine = engine();
    svc_state(&mut engine, ServiceState::Ok, "OK", 0);

    let line = format!(
        "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};0;0;5;admin;flexible",
        NOW + 3600
    );
    let id = schedule(&mut engine, &line, 0);
    let dt = engine.downtime(&id).unwrap();
    assert!(!dt.fixed && dt.is_pending());
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 0);

    // OK checks never start it.
    svc_state(&mut engine, ServiceState::Ok, "OK", 1);
    assert!(engine.downtime(&id).unwrap().is_pending());

    svc_state(&mut engine, ServiceState::Critical, "BAD", 2);
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 0);

    svc_state(&mut engine, ServiceState::Critical, "BAD", 3);
    let dt = engine.downtime(&id).unwrap();
    assert!(dt.is_in_effect);
    assert_eq!(dt.real_end_time, at(3) + TimeDelta::seconds(5));
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 1);
    assert!(engine.outstanding_problem(&svc()).unwrap().suppressed());

    // Ends after its duration even though the service is still CRITICAL.
    svc_state(&mut engine, ServiceState::Critical, "BAD", 7);
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 1);
    engine.tick(at(8));
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 0);
    assert!(engine.downtimes().is_empty());

    // Recovery, then a fresh problem outside any downtime.
    svc_state(&mut engine, ServiceState::Ok, "OK", 9);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 10);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 11);
    assert_eq!(
        actions(&engine),
        vec![
            (NotificationType::DowntimeStart, false, false),
            (NotificationType::DowntimeEnd, false, false),
            (NotificationType::Problem, false, false),
            (NotificationType::Problem, true, false),
        ]
    );
}

#[test]
fn test_flexible_downtime_outside_window_never_starts() {
    let mut engine = engine();
    let line = format!(
        "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{};{};0;0;5;admin;later",
        NOW + 100,
        NOW + 200
    );
    schedule(&mut engine, &line, 0);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 1);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 2);
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 0);
    assert!(!engine.outstanding_problem(&svc()).unwrap().suppressed());
}

// ── Host downtime and dependent services ────────────────────────────

#[test]
fn test_host_downtime_does_not_mute_services() {
    let mut engine = engine();
    let line = format!(
        "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{};1;0;0;admin;host work",
        NOW + 900
    );
    schedule(&mut engine, &line, 0);
    assert!(engine.item(&host()).unwrap().in_scheduled_downtime());
    assert!(!engine.item(&svc()).unwrap().in_scheduled_downtime());

    svc_state(&mut engine, ServiceState::Critical, "BAD", 1);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 2);
    assert!(!engine.outstanding_problem(&svc()).unwrap().suppressed());

    host_state(&mut engine, HostState::Down, "DOWN", 3);
    host_state(&mut engine, HostState::Down, "DOWN", 4);
    assert!(engine.outstanding_problem(&host()).unwrap().suppressed());

    assert_logged(
        &engine,
        LogLevel::Info,
        "HOST NOTIFICATION MASTER: test_host_0;PROBLEM;1;SUPPRESSED (downtime)",
    );
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE NOTIFICATION MASTER: test_host_0;test_ok_0;PROBLEM;1;DISPATCHED",
    );
    assert_logged(
        &engine,
        LogLevel::Error,
        "HOST ALERT: test_host_0;DOWN;HARD;2;DOWN",
    );
}

// ── Trigger chains and cancellation ─────────────────────────────────

#[test]
fn test_trigger_chain_and_cascading_cancel() {
    let mut engine = engine();
    let parent = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{};{};1;0;0;admin;parent",
            NOW + 60,
            NOW + 600
        ),
        0,
    );
    let child = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;{parent};0;admin;child",
            NOW + 600
        ),
        1,
    );

    // The child's window is open, but it waits for its parent.
    engine.tick(at(30));
    assert!(engine.downtime(&child).unwrap().is_pending());
    assert_eq!(engine.downtime(&parent).unwrap().activate_me, vec![child]);

    engine.tick(at(60));
    assert!(engine.downtime(&parent).unwrap().is_in_effect);
    assert!(engine.downtime(&child).unwrap().is_in_effect);
    assert!(engine.item(&svc()).unwrap().in_scheduled_downtime());

    let outcome = command(&mut engine, &format!("[{}] DEL_HOST_DOWNTIME;{parent}", NOW + 100), 100);
    assert_eq!(
        outcome,
        Outcome::DowntimeCancelled {
            id: parent,
            found: true
        }
    );
    assert!(engine.downtimes().is_empty());
    assert_logged(
        &engine,
        LogLevel::Info,
        "HOST DOWNTIME ALERT: test_host_0;CANCELLED; Scheduled downtime for host has been cancelled.",
    );
    assert_logged(
        &engine,
        LogLevel::Info,
        "SERVICE DOWNTIME ALERT: test_host_0;test_ok_0;CANCELLED; \
         Scheduled downtime for service has been cancelled.",
    );
    let ends = actions(&engine)
        .into_iter()
        .filter(|(t, _, _)| *t == NotificationType::DowntimeEnd)
        .count();
    assert_eq!(ends, 2);
}

#[test]
fn test_triggered_downtime_released_when_parent_already_active() {
    let mut engine = engine();
    let parent = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{};1;0;0;admin;parent",
            NOW + 600
        ),
        0,
    );
    let child = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};0;{parent};30;admin;child",
            NOW + 600
        ),
        5,
    );
    let dt = engine.downtime(&child).unwrap();
    assert!(dt.is_in_effect);
    assert_eq!(dt.real_end_time, at(35));
}

#[test]
fn test_unknown_trigger_is_a_warning() {
    let mut engine = engine();
    let ghost = DowntimeId::new();
    let id = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;{ghost};0;admin;orphan",
            NOW + 600
        ),
        0,
    );
    let dt = engine.downtime(&id).unwrap();
    assert_eq!(dt.trigger_id, None);
    assert!(dt.is_in_effect);
    assert_eq!(engine.log().filter(Some(LogLevel::Warning), Some(&ghost.to_string())).len(), 1);
}

#[test]
fn test_child_of_stale_parent_becomes_self_triggered() {
    let mut engine = engine();
    let parent = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{};0;0;10;admin;if it breaks",
            NOW + 100
        ),
        0,
    );
    let child = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;{parent};0;admin;follows host",
            NOW + 600
        ),
        0,
    );
    assert!(engine.downtime(&child).unwrap().is_pending());

    // The flexible parent never started; its window closing orphans the child.
    engine.tick(at(100));
    assert_consistent(&engine);
    assert!(engine.downtime(&parent).is_none());
    let dt = engine.downtime(&child).unwrap();
    assert_eq!(dt.trigger_id, None);
    assert!(dt.is_in_effect);
    assert_eq!(
        engine
            .log()
            .filter(Some(LogLevel::Warning), Some(&parent.to_string()))
            .len(),
        1
    );
}

#[test]
fn test_child_of_expired_parent_starts_in_its_own_window() {
    let mut engine = engine();
    let parent = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{};1;0;0;admin;short",
            NOW + 50
        ),
        0,
    );
    let child = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{};{};1;{parent};0;admin;later",
            NOW + 60,
            NOW + 600
        ),
        0,
    );

    engine.tick(at(50));
    assert_consistent(&engine);
    assert!(engine.downtime(&parent).is_none());
    let dt = engine.downtime(&child).unwrap();
    assert_eq!(dt.trigger_id, None);
    assert!(dt.is_pending());
    assert_eq!(engine.log().filter(Some(LogLevel::Warning), None).len(), 1);

    engine.tick(at(60));
    assert_consistent(&engine);
    assert!(engine.downtime(&child).unwrap().is_in_effect);
}

#[test]
fn test_cancel_pending_is_silent_and_idempotent() {
    let mut engine = engine();
    let id = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{};{};1;0;0;admin;later",
            NOW + 60,
            NOW + 120
        ),
        0,
    );

    assert!(engine.cancel_downtime(&id, at(1)));
    assert!(engine.downtimes().is_empty());
    assert_not_logged(&engine, "DOWNTIME ALERT");
    assert!(actions(&engine).is_empty());

    assert!(!engine.cancel_downtime(&id, at(2)));
    assert_eq!(
        engine
            .log()
            .filter(Some(LogLevel::Warning), Some("cannot cancel"))
            .len(),
        1
    );
}

// ── Commands ────────────────────────────────────────────────────────

#[test]
fn test_invalid_window_is_rejected_without_side_effects() {
    let mut engine = engine();
    let err = engine
        .process_command(
            &format!("[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{NOW};1;0;0;admin;empty"),
            at(0),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidWindow { .. }));

    let err = engine
        .process_command(
            &format!(
                "[{NOW}] SCHEDULE_HOST_DOWNTIME;test_host_0;{NOW};{};0;0;0;admin;no duration",
                NOW + 60
            ),
            at(0),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidWindow { .. }));

    assert!(engine.downtimes().is_empty());
    assert_eq!(engine.log().filter(Some(LogLevel::Error), Some("REJECTED")).len(), 2);
    assert_not_logged(&engine, "EXTERNAL COMMAND: ");
}

#[test]
fn test_out_of_range_flexible_duration_is_rejected() {
    let mut engine = engine();
    let err = engine
        .process_command(
            &format!(
                "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};0;0;{};admin;forever",
                NOW + 900,
                i64::MAX
            ),
            at(0),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidWindow { .. }));
    assert!(engine.downtimes().is_empty());

    svc_state(&mut engine, ServiceState::Critical, "BAD", 1);
    svc_state(&mut engine, ServiceState::Critical, "BAD", 2);
    assert!(!engine.item(&svc()).unwrap().in_scheduled_downtime());
}

#[test]
fn test_passive_check_result() {
    let mut engine = engine();
    let outcome = command(
        &mut engine,
        &format!("[{NOW}] PROCESS_SERVICE_CHECK_RESULT;test_host_0;test_ok_0;2;disk full; 98%"),
        0,
    );
    let Outcome::Transition(event) = outcome else {
        panic!("expected a transition");
    };
    assert_eq!(event.new_state, State::Service(ServiceState::Critical));
    assert_logged(
        &engine,
        LogLevel::Error,
        "PASSIVE SERVICE CHECK: test_host_0;test_ok_0;CRITICAL;1;disk full; 98%",
    );
    assert_logged(
        &engine,
        LogLevel::Error,
        "SERVICE ALERT: test_host_0;test_ok_0;CRITICAL;SOFT;1;disk full; 98%",
    );
}

// ── Persistence ─────────────────────────────────────────────────────

#[test]
fn test_active_downtime_survives_restore() {
    let mut engine = engine();
    let id = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;0;0;admin;persisted",
            NOW + 600
        ),
        0,
    );
    let json = engine.downtime(&id).unwrap().to_json().unwrap();
    let restored = Downtime::from_json(json).unwrap();
    assert_eq!(&restored, engine.downtime(&id).unwrap());

    let mut fresh = self::engine();
    fresh.restore_downtime(restored, at(10)).unwrap();
    let item = fresh.item(&svc()).unwrap();
    assert_eq!(item.scheduled_downtime_depth(), 1);
    assert_eq!(item.comments.len(), 1);
    assert_consistent(&fresh);

    fresh.tick(at(600));
    assert!(fresh.downtimes().is_empty());
    assert_consistent(&fresh);
}

#[test]
fn test_restoring_an_attached_downtime_replaces_it() {
    let mut engine = engine();
    let id = schedule(
        &mut engine,
        &format!(
            "[{NOW}] SCHEDULE_SVC_DOWNTIME;test_host_0;test_ok_0;{NOW};{};1;0;0;admin;persisted",
            NOW + 600
        ),
        0,
    );

    for offset in [10, 20] {
        let copy = Downtime::from_json(engine.downtime(&id).unwrap().to_json().unwrap()).unwrap();
        engine.restore_downtime(copy, at(offset)).unwrap();
        assert_consistent(&engine);
        assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 1);
        assert_eq!(engine.downtimes().len(), 1);
    }

    engine.tick(at(600));
    assert_consistent(&engine);
    assert!(engine.downtimes().is_empty());
    assert_eq!(engine.item(&svc()).unwrap().scheduled_downtime_depth(), 0);
    assert!(engine.log().filter(Some(LogLevel::Warning), None).is_empty());
}
