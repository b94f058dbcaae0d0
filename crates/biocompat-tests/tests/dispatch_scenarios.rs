//! End-to-end dispatch scenarios
//!
//! These tests drive complete requests through a context built from scripted
//! back-ends and check the callback sequence the caller observes.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use biocompat_core::{
    codes, AuthOutcome, AuthRequest, AuthenticationCallback, AuthenticationFailureReason,
    AuthenticationHelpReason, BiometricApi, BiometricContext, BiometricContextBuilder,
    BiometricMethod, BiometricModule, BiometricType, DispatchMode, Dispatcher, DispatcherConfig,
    FocusWatch, ManualClock, PermissionGate, PromptInfo, ScriptedModule, VendorEvent,
    DELIVERY_THREAD_NAME,
};
use parking_lot::Mutex;
use tempfile::tempdir;

// ============================================
// Helpers
// ============================================

/// Records every callback together with the thread it ran on
#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    threads: Mutex<Vec<Option<String>>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
        self.threads
            .lock()
            .push(std::thread::current().name().map(str::to_string));
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl AuthenticationCallback for Recorder {
    fn on_ui_opened(&self) {
        self.push("opened");
    }

    fn on_ui_closed(&self) {
        self.push("closed");
    }

    fn on_succeeded(&self) {
        self.push("succeeded");
    }

    fn on_canceled(&self) {
        self.push("canceled");
    }

    fn on_failed(&self, reason: AuthenticationFailureReason) {
        self.push(format!("failed:{}", reason));
    }

    fn on_help(&self, reason: AuthenticationHelpReason, _message: &str) {
        self.push(format!("help:{:?}", reason));
    }
}

struct DenyAll;

#[async_trait]
impl PermissionGate for DenyAll {
    async fn request_permissions(&self, _permissions: &[String]) -> bool {
        false
    }
}

fn prompt() -> PromptInfo {
    PromptInfo::builder()
        .title("Confirm payment")
        .negative_button_text("Use password")
        .build()
        .unwrap()
}

fn builder_with(modules: &[Arc<ScriptedModule>]) -> BiometricContextBuilder {
    modules
        .iter()
        .fold(BiometricContext::builder(), |builder, module| {
            builder.module(module.clone() as Arc<dyn BiometricModule>)
        })
}

async fn dispatcher_with(builder: BiometricContextBuilder) -> Dispatcher {
    let context = builder.build().unwrap();
    context.init().await;
    Dispatcher::new(context)
}

async fn run(dispatcher: &Dispatcher, request: AuthRequest) -> (AuthOutcome, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let outcome = dispatcher
        .authenticate(request, prompt(), recorder.clone())
        .outcome()
        .await;
    (outcome, recorder)
}

async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn sensor_failed() -> VendorEvent {
    VendorEvent::error(codes::ERROR_UNABLE_TO_PROCESS)
}

// ============================================
// Scenarios
// ============================================

#[tokio::test]
async fn test_no_hardware_fails_without_ui() {
    let face = Arc::new(ScriptedModule::new(BiometricMethod::FaceMiui).with_hardware(false));
    let fingerprint =
        Arc::new(ScriptedModule::new(BiometricMethod::FingerprintUnified).with_hardware(false));
    let dispatcher = dispatcher_with(builder_with(&[face.clone(), fingerprint.clone()])).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::NoHardware)
    );
    assert_eq!(recorder.events(), vec!["failed:NO_HARDWARE"]);
    assert_eq!(face.authenticate_calls(), 0);
    assert_eq!(fingerprint.authenticate_calls(), 0);
    assert!(dispatcher.context().available_auth_requests().is_empty());
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintUnified)
            .with_session(vec![VendorEvent::error(codes::ERROR_TIMEOUT)])
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()])).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::Timeout));
    assert_eq!(recorder.events(), vec!["opened", "failed:TIMEOUT", "closed"]);
    assert_eq!(module.authenticate_calls(), 1);
    assert_eq!(module.remaining_sessions(), 1);
}

#[tokio::test]
async fn test_silent_retries_then_success() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintUnified)
            .with_session(vec![VendorEvent::NoMatch])
            .with_session(vec![VendorEvent::NoMatch])
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()])).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Succeeded);
    assert_eq!(recorder.events(), vec!["opened", "succeeded", "closed"]);
    assert_eq!(module.authenticate_calls(), 3);
    assert_eq!(module.overlapping_sessions(), 0);
}

#[tokio::test]
async fn test_restart_cap_locks_out_until_window_elapses() {
    let clock = Arc::new(ManualClock::default());
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintSupport)
            .with_session(vec![sensor_failed()])
            .with_session(vec![sensor_failed()])
            .with_session(vec![sensor_failed()])
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()]).clock(clock.clone())).await;
    let request = AuthRequest::pinned(BiometricMethod::FingerprintSupport);

    let (outcome, recorder) = run(&dispatcher, request).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));
    assert_eq!(recorder.events(), vec!["opened", "failed:LOCKED_OUT", "closed"]);
    assert_eq!(module.authenticate_calls(), 3);

    // Immediate retry short-circuits without touching the vendor
    let (outcome, recorder) = run(&dispatcher, request).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));
    assert_eq!(recorder.events(), vec!["failed:LOCKED_OUT"]);
    assert_eq!(module.authenticate_calls(), 3);

    clock.advance(Duration::from_secs(30));
    let (outcome, _) = run(&dispatcher, request).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));

    clock.advance(Duration::from_secs(1));
    let (outcome, _) = run(&dispatcher, request).await;
    assert_eq!(outcome, AuthOutcome::Succeeded);
    assert_eq!(module.authenticate_calls(), 4);
}

#[tokio::test]
async fn test_lockout_expiry_clears_record() {
    let clock = Arc::new(ManualClock::default());
    let module = Arc::new(ScriptedModule::new(BiometricMethod::FaceHuawei));
    let dispatcher = dispatcher_with(builder_with(&[module]).clock(clock.clone())).await;
    let lockouts = dispatcher.context().lockouts();

    assert!(lockouts.lockout(BiometricMethod::FaceHuawei));
    assert!(!lockouts.lockout(BiometricMethod::FaceHuawei));
    assert!(lockouts.is_locked_out(BiometricMethod::FaceHuawei));

    clock.advance(Duration::from_secs(31));
    assert!(lockouts.recorded_at(BiometricMethod::FaceHuawei).is_some());
    assert!(!lockouts.is_locked_out(BiometricMethod::FaceHuawei));
    assert!(lockouts.recorded_at(BiometricMethod::FaceHuawei).is_none());
}

#[tokio::test]
async fn test_preflight_never_starts_vendor_session() {
    let unenrolled = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceSamsung)
            .with_enrolled(false)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[unenrolled.clone()])).await;
    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::NoBiometricsRegistered)
    );
    assert_eq!(recorder.events(), vec!["failed:NO_BIOMETRICS_REGISTERED"]);
    assert_eq!(unenrolled.authenticate_calls(), 0);

    let locked = Arc::new(
        ScriptedModule::new(BiometricMethod::IrisSamsung)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    locked.set_vendor_locked(true);
    let dispatcher = dispatcher_with(builder_with(&[locked.clone()])).await;
    let (outcome, _) = run(&dispatcher, AuthRequest::default()).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));
    assert_eq!(locked.authenticate_calls(), 0);

    let inaccessible = Arc::new(ScriptedModule::new(BiometricMethod::FaceVivo).inaccessible());
    let dispatcher = dispatcher_with(builder_with(&[inaccessible.clone()])).await;
    let (outcome, _) = run(&dispatcher, AuthRequest::default()).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::NoHardware));
    assert_eq!(inaccessible.authenticate_calls(), 0);
}

#[tokio::test]
async fn test_cancel_during_session() {
    // No scripted sessions: the vendor never answers
    let module = Arc::new(ScriptedModule::new(BiometricMethod::FingerprintFlyme));
    let dispatcher = dispatcher_with(builder_with(&[module.clone()])).await;
    let recorder = Arc::new(Recorder::default());

    let handle = dispatcher.authenticate(AuthRequest::default(), prompt(), recorder.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!handle.is_finished());

    handle.cancel();
    handle.cancel();
    assert_eq!(handle.outcome().await, AuthOutcome::Canceled);

    assert_eq!(recorder.events(), vec!["opened", "canceled", "closed"]);
    assert!(module.cancel_calls() >= 1);
    assert_eq!(module.overlapping_sessions(), 0);
}

#[tokio::test]
async fn test_user_cancel_in_vendor_ui() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceOppo)
            .with_session(vec![VendorEvent::error(codes::ERROR_USER_CANCELED)]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module])).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Canceled);
    assert_eq!(recorder.events(), vec!["opened", "canceled", "closed"]);
}

#[tokio::test]
async fn test_cancel_during_slow_preflight() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceHuawei)
            .with_hardware(false)
            .with_probe_delay(Duration::from_millis(300)),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()])).await;
    let recorder = Arc::new(Recorder::default());

    let handle = dispatcher.authenticate(AuthRequest::default(), prompt(), recorder.clone());
    tokio::time::sleep(Duration::from_millis(10)).await;

    let cancelled_at = Instant::now();
    handle.cancel();
    assert_eq!(handle.outcome().await, AuthOutcome::Canceled);

    assert!(cancelled_at.elapsed() < Duration::from_millis(200));
    assert_eq!(recorder.events(), vec!["canceled"]);
    assert_eq!(module.authenticate_calls(), 0);
}

#[tokio::test]
async fn test_idle_cancel_is_noop() {
    let module = ScriptedModule::new(BiometricMethod::FaceOnePlus);
    module.cancel().await;
    module.cancel().await;
    assert_eq!(module.cancel_calls(), 2);
    assert_eq!(module.authenticate_calls(), 0);

    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceOnePlus)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module])).await;
    let recorder = Arc::new(Recorder::default());
    let handle = dispatcher.authenticate(AuthRequest::default(), prompt(), recorder.clone());

    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    handle.cancel();
    assert_eq!(handle.outcome().await, AuthOutcome::Succeeded);
    assert_eq!(recorder.events(), vec!["opened", "succeeded", "closed"]);
}

#[tokio::test]
async fn test_sequential_fallback_and_reason_aggregation() {
    let unified = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceUnified)
            .with_session(vec![VendorEvent::error(codes::ERROR_HW_UNAVAILABLE)]),
    );
    let legacy = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceSoter)
            .with_session(vec![VendorEvent::error(codes::ERROR_TIMEOUT)]),
    );
    let dispatcher = dispatcher_with(builder_with(&[legacy.clone(), unified.clone()])).await;

    let (outcome, recorder) = run(
        &dispatcher,
        AuthRequest::new(BiometricApi::Auto, BiometricType::Face),
    )
    .await;

    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::HardwareUnavailable)
    );
    assert_eq!(
        recorder.events(),
        vec!["opened", "failed:HARDWARE_UNAVAILABLE", "closed"]
    );
    assert_eq!(unified.authenticate_calls(), 1);
    assert_eq!(legacy.authenticate_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_first_success_cancels_rest() {
    // The unified module never answers; the legacy one succeeds
    let unified = Arc::new(ScriptedModule::new(BiometricMethod::FingerprintUnified));
    let legacy = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintSamsung)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let config = DispatcherConfig {
        dispatch_mode: DispatchMode::Concurrent,
        ..Default::default()
    };
    let dispatcher =
        dispatcher_with(builder_with(&[unified.clone(), legacy.clone()]).config(config)).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Succeeded);
    assert_eq!(recorder.events(), vec!["opened", "succeeded", "closed"]);
    assert_eq!(unified.authenticate_calls(), 1);
    assert!(unified.cancel_calls() >= 1);
    assert_eq!(legacy.authenticate_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_failures_aggregate_in_candidate_order() {
    let unified = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceUnified)
            .with_session(vec![VendorEvent::error(codes::ERROR_VENDOR)]),
    );
    // Finishes last but ranks ahead of the soter module
    let miui = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceMiui)
            .with_step_delay(Duration::from_millis(150))
            .with_session(vec![VendorEvent::error(codes::ERROR_TIMEOUT)]),
    );
    let soter = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceSoter)
            .with_session(vec![VendorEvent::error(codes::ERROR_HW_UNAVAILABLE)]),
    );
    let config = DispatcherConfig {
        dispatch_mode: DispatchMode::Concurrent,
        ..Default::default()
    };
    let builder = builder_with(&[soter.clone(), miui.clone(), unified.clone()]).config(config);
    let dispatcher = dispatcher_with(builder).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::Timeout));
    assert_eq!(recorder.events(), vec!["opened", "failed:TIMEOUT", "closed"]);
    assert_eq!(unified.authenticate_calls(), 1);
    assert_eq!(miui.authenticate_calls(), 1);
    assert_eq!(soter.authenticate_calls(), 1);
}

#[tokio::test]
async fn test_busy_methods_are_skipped_until_all_are_busy() {
    // The miui module never answers; the soter module succeeds once
    let miui = Arc::new(ScriptedModule::new(BiometricMethod::FaceMiui));
    let soter = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceSoter).with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[miui.clone(), soter.clone()])).await;
    let face = AuthRequest::new(BiometricApi::Auto, BiometricType::Face);

    let pinned = dispatcher.authenticate(
        AuthRequest::pinned(BiometricMethod::FaceMiui),
        prompt(),
        Arc::new(Recorder::default()),
    );
    wait_until(|| miui.authenticate_calls() == 1).await;

    let (outcome, recorder) = run(&dispatcher, face).await;
    assert_eq!(outcome, AuthOutcome::Succeeded);
    assert_eq!(recorder.events(), vec!["opened", "succeeded", "closed"]);
    assert_eq!(miui.authenticate_calls(), 1);
    assert_eq!(soter.authenticate_calls(), 1);

    // Takes the only free method and holds it
    let holder = dispatcher.authenticate(face, prompt(), Arc::new(Recorder::default()));
    wait_until(|| soter.authenticate_calls() == 2).await;

    let (outcome, recorder) = run(&dispatcher, face).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::HardwareUnavailable)
    );
    assert_eq!(recorder.events(), vec!["failed:HARDWARE_UNAVAILABLE"]);
    assert_eq!(miui.authenticate_calls(), 1);
    assert_eq!(soter.authenticate_calls(), 2);

    pinned.cancel();
    holder.cancel();
    assert_eq!(pinned.outcome().await, AuthOutcome::Canceled);
    assert_eq!(holder.outcome().await, AuthOutcome::Canceled);
}

#[tokio::test]
async fn test_request_waits_for_init_and_pending_tasks_run_once() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintLegacy)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let context = builder_with(&[module.clone()]).build().unwrap();
    let dispatcher = Dispatcher::new(context.clone());

    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    context
        .on_ready(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let recorder = Arc::new(Recorder::default());
    let handle = dispatcher.authenticate(AuthRequest::default(), prompt(), recorder.clone());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());
    assert!(!context.is_initialized());
    assert_eq!(module.authenticate_calls(), 0);

    context.init().await;
    assert_eq!(handle.outcome().await, AuthOutcome::Succeeded);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // A second init neither re-runs nor re-queues anything
    context.init().await;
    assert!(context.is_initialized());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_callbacks_run_on_delivery_thread() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintUnified).with_session(vec![
            VendorEvent::help(codes::ACQUIRED_PARTIAL),
            VendorEvent::Succeeded,
        ]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module])).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Succeeded);
    assert_eq!(
        recorder.events(),
        vec!["opened", "help:Partial", "succeeded", "closed"]
    );
    assert!(recorder
        .threads
        .lock()
        .iter()
        .all(|name| name.as_deref() == Some(DELIVERY_THREAD_NAME)));
}

#[tokio::test]
async fn test_denied_permissions_cancel_request() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceSoter)
            .with_permissions(vec!["android.permission.CAMERA".to_string()])
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher =
        dispatcher_with(builder_with(&[module.clone()]).permission_gate(Arc::new(DenyAll))).await;

    let (outcome, recorder) = run(&dispatcher, AuthRequest::default()).await;

    assert_eq!(outcome, AuthOutcome::Canceled);
    assert_eq!(recorder.events(), vec!["canceled"]);
    assert_eq!(module.authenticate_calls(), 0);
}

#[tokio::test]
async fn test_session_waits_for_window_focus() {
    let focus = Arc::new(FocusWatch::new(false));
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintUnified)
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()]).ui_host(focus.clone())).await;
    let recorder = Arc::new(Recorder::default());

    let handle = dispatcher.authenticate(AuthRequest::default(), prompt(), recorder.clone());
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(module.authenticate_calls(), 0);
    assert!(recorder.events().is_empty());

    focus.set_focused(true);
    assert_eq!(handle.outcome().await, AuthOutcome::Succeeded);
    assert_eq!(module.authenticate_calls(), 1);
}

#[tokio::test]
async fn test_permanent_lockout_until_device_unlock() {
    let module = Arc::new(
        ScriptedModule::new(BiometricMethod::FingerprintUnified)
            .with_session(vec![VendorEvent::error(codes::ERROR_LOCKOUT_PERMANENT)])
            .with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[module.clone()])).await;
    let request = AuthRequest::new(BiometricApi::Auto, BiometricType::Fingerprint);

    let (outcome, _) = run(&dispatcher, request).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::HardwareUnavailable)
    );
    assert!(dispatcher.context().is_permanently_locked(&request).unwrap());

    let (outcome, recorder) = run(&dispatcher, request).await;
    assert_eq!(
        outcome,
        AuthOutcome::Failed(AuthenticationFailureReason::HardwareUnavailable)
    );
    assert_eq!(recorder.events(), vec!["failed:HARDWARE_UNAVAILABLE"]);
    assert_eq!(module.authenticate_calls(), 1);

    dispatcher.context().on_device_unlocked();
    let (outcome, _) = run(&dispatcher, request).await;
    assert_eq!(outcome, AuthOutcome::Succeeded);
}

#[tokio::test]
async fn test_lockouts_survive_restart() {
    let temp_dir = tempdir().unwrap();
    let config = DispatcherConfig {
        lockout_store_path: Some(temp_dir.path().join("lockouts.json")),
        max_restarts: 0,
        ..Default::default()
    };

    let first = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceMiui).with_session(vec![VendorEvent::NoMatch]),
    );
    let dispatcher =
        dispatcher_with(builder_with(&[first.clone()]).config(config.clone())).await;
    let (outcome, _) = run(&dispatcher, AuthRequest::default()).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));
    assert!(temp_dir.path().join("lockouts.json").exists());

    let second = Arc::new(
        ScriptedModule::new(BiometricMethod::FaceMiui).with_session(vec![VendorEvent::Succeeded]),
    );
    let dispatcher = dispatcher_with(builder_with(&[second.clone()]).config(config)).await;
    let (outcome, _) = run(&dispatcher, AuthRequest::default()).await;
    assert_eq!(outcome, AuthOutcome::Failed(AuthenticationFailureReason::LockedOut));
    assert_eq!(second.authenticate_calls(), 0);
}
