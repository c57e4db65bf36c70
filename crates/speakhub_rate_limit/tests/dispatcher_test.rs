//! Tests for the rate-limited command dispatcher.

use speakhub_core::{ChannelEdit, ChannelId, ChannelSpec, GuildId, IdempotencyKey, UserId};
use speakhub_error::{DispatchErrorKind, PlatformError, PlatformErrorKind};
use speakhub_interface::{CallKind, InMemoryPlatform, RemoteChannel};
use speakhub_rate_limit::{
    BucketClass, BucketKey, Command, CommandDispatcher, CommandOutput, DispatcherConfig,
};
use std::sync::Arc;
use std::time::Duration;

const GUILD: GuildId = GuildId(1);

fn setup(config: DispatcherConfig) -> (Arc<InMemoryPlatform>, CommandDispatcher) {
    let platform = Arc::new(InMemoryPlatform::new());
    let dispatcher = CommandDispatcher::new(platform.clone(), config);
    (platform, dispatcher)
}

fn create(user: u64, key: &str) -> Command {
    Command::CreateChannel {
        guild: GUILD,
        spec: ChannelSpec::builder()
            .name(format!("room {}", user))
            .owner(UserId(user))
            .build()
            .unwrap(),
        key: IdempotencyKey::new(key),
    }
}

fn rename(channel: u64, name: &str) -> Command {
    Command::EditChannel {
        guild: GUILD,
        channel: ChannelId(channel),
        edit: ChannelEdit::default().with_name(name),
        key: IdempotencyKey::new(format!("edit:{}:{}", channel, name)),
    }
}

fn add_channel(platform: &InMemoryPlatform, id: u64) {
    platform.insert_channel(
        GUILD,
        RemoteChannel::new(ChannelId(id), "x", None, chrono::Utc::now()),
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_is_respected() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    platform.fail_next(
        CallKind::CreateChannel,
        PlatformError::rate_limited(Some(Duration::from_secs(5))),
    );

    let output = dispatcher.submit(create(7, "create:1:7#a")).await.unwrap();

    assert!(matches!(output, CommandOutput::Created(_)));
    let calls = platform.calls_of(CallKind::CreateChannel);
    assert_eq!(calls.len(), 2);
    assert!(*calls[1].at() - *calls[0].at() >= Duration::from_secs(5));
    assert_eq!(platform.channels(GUILD).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_freezes_bucket_for_other_commands() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    let dispatcher = Arc::new(dispatcher);
    platform.fail_next(
        CallKind::CreateChannel,
        PlatformError::rate_limited(Some(Duration::from_secs(5))),
    );

    let first = dispatcher.submit(create(7, "a"));
    let second = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        dispatcher.submit(create(8, "b")).await
    };
    let (first, second) = tokio::join!(first, second);
    assert!(first.is_ok());
    assert!(second.is_ok());

    let calls = platform.calls_of(CallKind::CreateChannel);
    let start = *calls[0].at();
    for call in &calls[1..] {
        assert!(*call.at() - start >= Duration::from_secs(5));
    }
    assert!(
        dispatcher
            .bucket(BucketKey {
                guild: GUILD,
                class: BucketClass::ChannelLifecycle,
            })
            .frozen_until()
            .is_none()
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_that_failed_after_taking_effect_is_not_repeated() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    platform.fail_after_next_create(PlatformError::new(PlatformErrorKind::Network(
        "connection reset".to_string(),
    )));

    let output = dispatcher.submit(create(7, "create:1:7#a")).await.unwrap();

    assert_eq!(output, CommandOutput::Created(ChannelId(1000)));
    assert_eq!(platform.channels(GUILD).len(), 1);
    assert_eq!(platform.count(CallKind::CreateChannel), 1);
    assert_eq!(platform.count(CallKind::FindCreated), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_retried_when_nothing_was_made() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    platform.fail_next(
        CallKind::CreateChannel,
        PlatformError::new(PlatformErrorKind::Network("connection reset".to_string())),
    );

    let output = dispatcher.submit(create(7, "create:1:7#a")).await.unwrap();

    assert!(matches!(output, CommandOutput::Created(_)));
    assert_eq!(platform.channels(GUILD).len(), 1);
    assert_eq!(platform.count(CallKind::CreateChannel), 2);
    assert_eq!(platform.count(CallKind::FindCreated), 1);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_is_not_retried() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    add_channel(&platform, 9);
    platform.fail_next(
        CallKind::EditChannel,
        PlatformError::new(PlatformErrorKind::PermissionDenied("manage".to_string())),
    );

    let err = dispatcher.submit(rename(9, "x")).await.unwrap_err();

    assert!(err.is_terminal());
    assert_eq!(platform.count(CallKind::EditChannel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() {
    let (platform, dispatcher) = setup(DispatcherConfig::default().with_max_attempts(3));
    add_channel(&platform, 9);
    for _ in 0..3 {
        platform.fail_next(
            CallKind::EditChannel,
            PlatformError::new(PlatformErrorKind::Network("reset".to_string())),
        );
    }

    let err = dispatcher.submit(rename(9, "x")).await.unwrap_err();

    assert!(matches!(
        err.kind,
        DispatchErrorKind::RetriesExhausted { attempts: 3, .. }
    ));
    assert!(!err.is_terminal());
    assert_eq!(platform.count(CallKind::EditChannel), 3);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_key_is_replayed() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());

    let first = dispatcher.submit(create(7, "create:1:7#a")).await.unwrap();
    let second = dispatcher.submit(create(7, "create:1:7#a")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(platform.count(CallKind::CreateChannel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_duplicates_execute_once() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    platform.set_latency(Duration::from_millis(100));

    let (a, b) = tokio::join!(
        dispatcher.submit(create(7, "same")),
        dispatcher.submit(create(7, "same"))
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(platform.count(CallKind::CreateChannel), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_resource_runs_in_submission_order() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    add_channel(&platform, 9);
    platform.set_latency(Duration::from_millis(100));

    let (a, b, c) = tokio::join!(
        dispatcher.submit(rename(9, "a")),
        dispatcher.submit(rename(9, "b")),
        dispatcher.submit(rename(9, "c"))
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());

    let calls = platform.calls_of(CallKind::EditChannel);
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        assert!(*pair[1].at() - *pair[0].at() >= Duration::from_millis(100));
    }
    assert_eq!(platform.channels(GUILD)[0].name(), "c");
}

#[tokio::test(start_paused = true)]
async fn test_different_resources_run_concurrently() {
    let (platform, dispatcher) = setup(DispatcherConfig::default());
    add_channel(&platform, 9);
    add_channel(&platform, 10);
    platform.set_latency(Duration::from_millis(100));

    let (a, b) = tokio::join!(
        dispatcher.submit(rename(9, "a")),
        dispatcher.submit(rename(10, "b"))
    );
    assert!(a.is_ok() && b.is_ok());

    let calls = platform.calls_of(CallKind::EditChannel);
    assert_eq!(calls[0].at(), calls[1].at());
}

#[tokio::test(start_paused = true)]
async fn test_submission_timeout() {
    let (platform, dispatcher) =
        setup(DispatcherConfig::default().with_submit_timeout_secs(1));
    add_channel(&platform, 9);
    platform.set_latency(Duration::from_secs(5));

    let err = dispatcher.submit(rename(9, "slow")).await.unwrap_err();

    assert!(matches!(err.kind, DispatchErrorKind::Timeout(_)));
}
