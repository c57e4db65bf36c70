//! Lifecycle state machine tests against the in-memory platform.

mod test_utils;

use chrono::Utc;
use speakhub_core::{
    ChannelId, DeliveryId, DriftCondition, GuildId, NormalizedEvent, OverwriteTarget,
    OwnerLeavePolicy,
};
use speakhub_error::{LifecycleErrorKind, PlatformError, PlatformErrorKind};
use speakhub_interface::CallKind;
use speakhub_orchestrator::{Suppression, TeardownOutcome, Transition};
use std::time::Duration;
use test_utils::{GUEST, GUILD, Harness, JOIN, OWNER, settings};
use tokio::time::sleep;

const GRACE: Duration = Duration::from_secs(10);

#[tokio::test(start_paused = true)]
async fn test_channel_created_and_deleted_after_grace() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;

    assert_eq!(h.platform.voice_state(GUILD, OWNER), Some(channel));
    let managed = h.cache.channel(GUILD, channel).unwrap();
    assert_eq!(managed.owner_id(), &OWNER);
    assert_eq!(managed.occupancy(), &1);
    assert_eq!(managed.name(), "🔊╏ user7");
    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
    assert_eq!(h.platform.count(CallKind::MoveMember), 1);

    let transitions = h.disconnect(OWNER).await;
    assert_eq!(
        transitions,
        vec![Transition::TeardownScheduled {
            channel,
            after: GRACE
        }]
    );

    sleep(Duration::from_secs(9)).await;
    assert!(h.platform.has_channel(GUILD, channel));

    sleep(Duration::from_secs(2)).await;
    assert!(!h.platform.has_channel(GUILD, channel));
    assert!(h.cache.channel(GUILD, channel).is_none());
    assert_eq!(h.platform.count(CallKind::DeleteChannel), 1);
    assert_eq!(h.orchestrator.metrics().channels_created(), 1);
    assert_eq!(h.orchestrator.metrics().channels_deleted(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_trigger_is_stale() {
    let mut h = Harness::new();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    let event = h.enter(OWNER, JOIN);

    let first = h.orchestrator.handle(event.clone()).await.unwrap();
    let second = h.orchestrator.handle(event).await.unwrap();

    assert!(matches!(first[..], [Transition::Created { moved: true, .. }]));
    assert!(second.is_empty());
    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_create_once() {
    let h = Harness::new();
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    h.platform.set_latency(Duration::from_millis(50));
    let at = Utc::now();
    let trigger = |delivery| NormalizedEvent::UserEnteredChannel {
        guild: GUILD,
        user: OWNER,
        channel: JOIN,
        display_name: "Ada".to_string(),
        at,
        delivery_id: DeliveryId(delivery),
    };

    let (first, second) = tokio::join!(
        h.orchestrator.handle(trigger(1)),
        h.orchestrator.handle(trigger(2)),
    );
    let mut transitions = first.unwrap();
    transitions.extend(second.unwrap());

    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
    assert_eq!(
        transitions
            .iter()
            .filter(|t| matches!(t, Transition::Created { .. }))
            .count(),
        1
    );
    assert!(transitions.contains(&Transition::CreationSuppressed {
        user: OWNER,
        reason: Suppression::AlreadyPending,
    }));
    assert_eq!(h.orchestrator.metrics().creations_suppressed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_owner_returning_to_join_channel_keeps_one_channel() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;

    let transitions = h.join(OWNER, JOIN).await;

    assert_eq!(
        transitions,
        vec![
            Transition::TeardownScheduled {
                channel,
                after: GRACE
            },
            Transition::Returned {
                channel,
                owner: OWNER,
            },
        ]
    );
    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
    assert_eq!(h.platform.count(CallKind::MoveMember), 2);
    assert_eq!(h.platform.voice_state(GUILD, OWNER), Some(channel));
    assert_eq!(h.cache.presence(GUILD, OWNER), Some(channel));

    sleep(GRACE + Duration::from_secs(1)).await;
    assert!(h.platform.has_channel(GUILD, channel));
}

#[tokio::test(start_paused = true)]
async fn test_owner_stays_in_join_channel_when_return_fails() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.platform.fail_next(
        CallKind::MoveMember,
        PlatformError::new(PlatformErrorKind::Rejected("member left voice".to_string())),
    );

    let transitions = h.join(OWNER, JOIN).await;

    assert_eq!(
        transitions.last(),
        Some(&Transition::CreationSuppressed {
            user: OWNER,
            reason: Suppression::AlreadyOwns(channel),
        })
    );
    assert_eq!(h.platform.count(CallKind::CreateChannel), 1);
    assert_eq!(h.cache.presence(GUILD, OWNER), Some(JOIN));
}

#[tokio::test(start_paused = true)]
async fn test_rejoin_within_grace_keeps_channel() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.disconnect(OWNER).await;

    sleep(Duration::from_secs(5)).await;
    assert!(h.join(OWNER, channel).await.is_empty());
    sleep(Duration::from_secs(20)).await;

    assert!(h.platform.has_channel(GUILD, channel));
    assert_eq!(h.platform.count(CallKind::DeleteChannel), 0);
    assert_eq!(h.cache.channel(GUILD, channel).unwrap().occupancy(), &1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_and_rejoin_restarts_grace_window() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.disconnect(OWNER).await;
    sleep(Duration::from_secs(5)).await;
    h.join(OWNER, channel).await;
    h.disconnect(OWNER).await;

    // The first timer fires here but the window restarted at 5s.
    sleep(Duration::from_secs(8)).await;
    assert!(h.platform.has_channel(GUILD, channel));

    sleep(Duration::from_secs(3)).await;
    assert!(!h.platform.has_channel(GUILD, channel));
    assert_eq!(h.platform.count(CallKind::DeleteChannel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_move_schedules_teardown() {
    let mut h = Harness::new();
    h.platform.fail_next(
        CallKind::MoveMember,
        PlatformError::new(PlatformErrorKind::Rejected("member left voice".to_string())),
    );
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));
    let event = h.enter(OWNER, JOIN);

    let transitions = h.orchestrator.handle(event).await.unwrap();
    let Transition::Created { channel, moved, .. } = transitions[0] else {
        panic!("expected a created channel, got {:?}", transitions);
    };
    assert!(!moved);
    assert!(matches!(
        h.cache.take_drift(GUILD)[..],
        [DriftCondition::MoveFailed { user: OWNER, .. }]
    ));

    sleep(GRACE + Duration::from_secs(1)).await;
    assert!(!h.platform.has_channel(GUILD, channel));
    assert!(h.cache.channel(GUILD, channel).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_leave_and_join_converge() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    let join = h.enter(GUEST, channel);
    let leave = h.leave(GUEST);

    assert!(h.orchestrator.handle(leave).await.unwrap().is_empty());
    assert!(h.orchestrator.handle(join).await.unwrap().is_empty());

    assert_eq!(h.cache.presence(GUILD, GUEST), None);
    assert_eq!(h.cache.channel(GUILD, channel).unwrap().occupancy(), &1);
}

#[tokio::test(start_paused = true)]
async fn test_owner_leaving_transfers_ownership() {
    let mut h = Harness::with_settings(vec![
        settings()
            .owner_leave_policy(OwnerLeavePolicy::Transfer)
            .build()
            .unwrap(),
    ]);
    let channel = h.create_for(OWNER).await;
    h.join(GUEST, channel).await;

    let transitions = h.disconnect(OWNER).await;

    assert_eq!(
        transitions,
        vec![Transition::OwnershipTransferred {
            channel,
            from: OWNER,
            to: GUEST,
        }]
    );
    let managed = h.cache.channel(GUILD, channel).unwrap();
    assert_eq!(managed.owner_id(), &GUEST);
    let template = h.orchestrator.guild_settings(GUILD).unwrap().permissions().clone();
    assert_eq!(
        h.platform.overwrite(channel, OverwriteTarget::Member(GUEST)),
        Some(template.owner().clone())
    );
    assert_eq!(
        h.platform.overwrite(channel, OverwriteTarget::Member(OWNER)),
        Some(template.former_owner())
    );
}

#[tokio::test(start_paused = true)]
async fn test_owner_leaving_keeps_ownership_by_default() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.join(GUEST, channel).await;

    assert!(h.disconnect(OWNER).await.is_empty());
    assert_eq!(h.cache.channel(GUILD, channel).unwrap().owner_id(), &OWNER);
    assert_eq!(h.platform.count(CallKind::SetPermissionOverwrite), 0);
}

#[tokio::test(start_paused = true)]
async fn test_external_deletion_is_purged_as_drift() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;
    h.platform.remove_channel(GUILD, channel);

    let at = h.tick();
    let transitions = h
        .orchestrator
        .handle(NormalizedEvent::ChannelDeletedExternally {
            guild: GUILD,
            channel,
            at,
        })
        .await
        .unwrap();

    assert_eq!(transitions, vec![Transition::Purged { channel }]);
    assert!(h.cache.channel(GUILD, channel).is_none());
    assert!(matches!(
        h.cache.take_drift(GUILD)[..],
        [DriftCondition::DeletedExternally { .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn test_join_channel_deletion_is_not_purged() {
    let mut h = Harness::new();
    let at = h.tick();
    let transitions = h
        .orchestrator
        .handle(NormalizedEvent::ChannelDeletedExternally {
            guild: GUILD,
            channel: JOIN,
            at,
        })
        .await
        .unwrap();

    assert!(transitions.is_empty());
    assert!(h.cache.take_drift(GUILD).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_creation_frees_slot_after_cooldown() {
    let mut h = Harness::new();
    h.platform.fail_next(
        CallKind::CreateChannel,
        PlatformError::new(PlatformErrorKind::PermissionDenied(
            "missing manage channels".to_string(),
        )),
    );
    h.platform.set_voice_state(GUILD, OWNER, Some(JOIN));

    let event = h.enter(OWNER, JOIN);
    let transitions = h.orchestrator.handle(event).await.unwrap();
    assert_eq!(transitions, vec![Transition::CreationFailed { user: OWNER }]);
    assert!(!h.cache.has_pending_creation(GUILD));
    assert!(matches!(
        h.cache.take_drift(GUILD)[..],
        [DriftCondition::TerminalFailure { .. }]
    ));

    let event = h.enter(OWNER, JOIN);
    let transitions = h.orchestrator.handle(event).await.unwrap();
    assert!(matches!(
        transitions[..],
        [Transition::CreationSuppressed {
            reason: Suppression::CoolingDown(_),
            ..
        }]
    ));

    sleep(Duration::from_secs(5)).await;
    let event = h.enter(OWNER, JOIN);
    let transitions = h.orchestrator.handle(event).await.unwrap();
    assert!(matches!(transitions[..], [Transition::Created { moved: true, .. }]));
}

#[tokio::test(start_paused = true)]
async fn test_try_teardown_respects_occupancy_and_grace() {
    let mut h = Harness::new();
    let channel = h.create_for(OWNER).await;

    assert_eq!(
        h.orchestrator.try_teardown(GUILD, channel).await,
        TeardownOutcome::Kept
    );

    h.platform.set_voice_state(GUILD, OWNER, None);
    let leave = h.leave(OWNER);
    h.cache.record_presence(GUILD, OWNER, None, leave.at());
    assert!(matches!(
        h.orchestrator.try_teardown(GUILD, channel).await,
        TeardownOutcome::Deferred(_)
    ));

    tokio::time::advance(GRACE).await;
    h.platform.remove_channel(GUILD, channel);
    assert_eq!(
        h.orchestrator.try_teardown(GUILD, channel).await,
        TeardownOutcome::Gone
    );
    assert!(h.cache.channel(GUILD, channel).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_guild_is_an_error() {
    let h = Harness::new();
    let err = h
        .orchestrator
        .handle(NormalizedEvent::ChannelDeletedExternally {
            guild: GuildId(99),
            channel: ChannelId(5),
            at: Utc::now(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err.kind, LifecycleErrorKind::UnknownGuild(99)));
}
