//! Submission controller: one state holder per form session.
//!
//! A session owns the current field values, the per-field errors, the lifecycle state, the cooldown
//! countdown, the toast and the slot holding the last generated image. Submitting spawns three
//! independent tasks (the outbound request, the countdown ticker and the toast timer); none of them
//! holds the state lock across an `.await`.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{info, error, warn};
use uuid::Uuid;

use crate::{
    inference::{GenerationError, ImageGenerator},
    models::{AvatarRequest, FieldErrors, GeneratedImage, SessionSnapshot, SubmissionState, Toast, ToastKind},
    prompt::build_prompt,
    validation::validate,
};

pub const COOLDOWN_TICKS: u32 = 20;
pub const TICK: Duration = Duration::from_secs(1);
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

pub const SUCCESS_MESSAGE: &str = "Avatar generated successfully!";
pub const FAILURE_MESSAGE: &str = "Failed to generate avatar. Please try again.";

pub const GENERATE_LABEL: &str = "Generate Avatar";
pub const REGENERATE_LABEL: &str = "Regenerate Avatar";

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("validation failed for {} field(s)", .0.len())]
    Invalid(FieldErrors),
    #[error("a generation is already running or cooling down")]
    Busy,
}

#[derive(Debug, Default)]
struct SessionInner {
    form: AvatarRequest,
    errors: FieldErrors,
    state: SubmissionState,
    loading: bool,
    countdown: u32,
    cooling: bool,
    image: Option<GeneratedImage>,
    toast: Toast,
    toast_seq: u64,
    last_prompt: Option<String>,
}

impl SessionInner {
    fn submit_enabled(&self) -> bool {
        !self.loading && !self.cooling
    }

    /// Idle -> Submitting. Returns the prompt to send.
    fn begin(&mut self, request: &AvatarRequest) -> String {
        let prompt = build_prompt(request);
        self.state = SubmissionState::Submitting;
        self.loading = true;
        self.image = None;
        self.form = AvatarRequest::default();
        self.errors.clear();
        self.countdown = COOLDOWN_TICKS;
        self.cooling = true;
        self.last_prompt = Some(prompt.clone());
        prompt
    }

    /// Records the request outcome and returns the toast sequence number to expire.
    fn settle(&mut self, outcome: Result<GeneratedImage, GenerationError>) -> u64 {
        self.loading = false;
        let (next, message, kind) = match outcome {
            Ok(image) => {
                self.image = Some(image);
                (SubmissionState::CoolingDown, SUCCESS_MESSAGE, ToastKind::Success)
            }
            Err(_) => (SubmissionState::Error, FAILURE_MESSAGE, ToastKind::Error),
        };
        self.state = if self.cooling { next } else { SubmissionState::Idle };
        self.show_toast(message, kind)
    }

    /// One countdown tick. Returns false once the cooldown is over.
    fn tick(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return true;
        }
        self.cooling = false;
        if !self.loading {
            self.state = SubmissionState::Idle;
        }
        false
    }

    fn show_toast(&mut self, message: &str, kind: ToastKind) -> u64 {
        self.toast_seq += 1;
        self.toast = Toast { message: message.to_string(), kind, visible: true };
        self.toast_seq
    }

    fn hide_toast(&mut self, seq: u64) {
        if self.toast_seq == seq {
            self.toast = Toast::default();
        }
    }
}

pub struct Session {
    id: Uuid,
    inner: Mutex<SessionInner>,
    last_touched: Mutex<Instant>,
    generator: Arc<dyn ImageGenerator>,
}

impl Session {
    pub fn new(id: Uuid, generator: Arc<dyn ImageGenerator>) -> Arc<Self> {
        Arc::new(Self {
            id,
            inner: Mutex::new(SessionInner::default()),
            last_touched: Mutex::new(Instant::now()),
            generator,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn touch(&self) {
        *self.last_touched.lock() = Instant::now();
    }

    /// Untouched for at least `ttl` with no request in flight and no cooldown running.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        let idle = self.last_touched.lock().elapsed() >= ttl;
        idle && self.inner.lock().submit_enabled()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        let countdown = (inner.cooling && inner.countdown > 0).then_some(inner.countdown);
        SessionSnapshot {
            id: self.id,
            state: inner.state,
            loading: inner.loading,
            submit_enabled: inner.submit_enabled(),
            button_label: if inner.image.is_some() { REGENERATE_LABEL } else { GENERATE_LABEL }.to_string(),
            countdown,
            countdown_label: countdown.map(|n| format!("{} seconds left", n)),
            form: inner.form.clone(),
            errors: inner.errors.clone(),
            toast: inner.toast.clone(),
            image: inner.image.as_ref().map(|img| img.info(self.id)),
            last_prompt: inner.last_prompt.clone(),
        }
    }

    pub fn image(&self) -> Option<GeneratedImage> {
        self.inner.lock().image.clone()
    }

    /// Replaces the visible field values; stale errors are dropped.
    pub fn update_form(&self, values: AvatarRequest) -> SessionSnapshot {
        {
            let mut inner = self.inner.lock();
            inner.form = values;
            inner.errors.clear();
        }
        self.snapshot()
    }

    /// Validates and, when valid, starts a generation.
    ///
    /// Returns as soon as the request is issued; the outcome lands in the session state.
    pub fn submit(self: &Arc<Self>, values: AvatarRequest) -> Result<SessionSnapshot, SubmitError> {
        let prompt = {
            let mut inner = self.inner.lock();
            if !inner.submit_enabled() {
                warn!(session = %self.id, "⏳ Submit rejected while busy");
                return Err(SubmitError::Busy);
            }
            match validate(&values) {
                Ok(request) => inner.begin(&request),
                Err(errors) => {
                    info!(session = %self.id, fields = errors.len(), "📝 Validation failed");
                    inner.form = values;
                    inner.errors = errors.clone();
                    return Err(SubmitError::Invalid(errors));
                }
            }
        };

        info!(session = %self.id, "🚀 Generated Prompt: {}", prompt);
        self.spawn_countdown();
        self.spawn_request(prompt);
        Ok(self.snapshot())
    }

    fn spawn_countdown(self: &Arc<Self>) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + TICK, TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let running = session.inner.lock().tick();
                if !running {
                    break;
                }
            }
            info!(session = %session.id, "⏱️ Cooldown finished");
        });
    }

    fn spawn_request(self: &Arc<Self>, prompt: String) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = session.generator.generate(&prompt).await;
            match &outcome {
                Ok(image) => info!(session = %session.id, "✅ Avatar generated ({} bytes, {})", image.bytes.len(), image.content_type),
                Err(e) => error!(session = %session.id, "❌ Error generating avatar: {}", e),
            }
            let seq = session.inner.lock().settle(outcome);
            session.spawn_toast_expiry(seq);
        });
    }

    fn spawn_toast_expiry(self: &Arc<Self>, seq: u64) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            sleep(TOAST_DURATION).await;
            session.inner.lock().hide_toast(seq);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{decode_image_payload, tests::tiny_png};
    use crate::models::Field;
    use async_trait::async_trait;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;

    /// Answers after `delay` of (virtual) time and records every prompt it sees.
    struct FakeGenerator {
        delay: Duration,
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeGenerator {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self { delay, fail, prompts: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().len()
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeGenerator {
        async fn generate(&self, prompt: &str) -> Result<GeneratedImage, GenerationError> {
            self.prompts.lock().push(prompt.to_string());
            sleep(self.delay).await;
            if self.fail {
                Err(GenerationError::Status { status: 500, body: "boom".into() })
            } else {
                decode_image_payload(Bytes::from(tiny_png()))
            }
        }
    }

    fn valid() -> AvatarRequest {
        AvatarRequest {
            hair: "long brown".into(),
            eyes: "blue".into(),
            face_shape: "round".into(),
            age: "25".into(),
            gender: "female".into(),
            nationality: "French".into(),
            occupation: "Designer".into(),
            dress: "casual".into(),
            customer_type: "vip".into(),
        }
    }

    async fn advance(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_session_is_idle_and_enabled() {
        let session = Session::new(Uuid::new_v4(), FakeGenerator::new(Duration::ZERO, false));
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Idle);
        assert!(snap.submit_enabled);
        assert_eq!(snap.button_label, GENERATE_LABEL);
        assert_eq!(snap.countdown, None);
        assert!(!snap.toast.visible);
        assert!(snap.image.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_submit_keeps_values_and_never_calls_out() {
        let generator = FakeGenerator::new(Duration::ZERO, false);
        let session = Session::new(Uuid::new_v4(), generator.clone());
        let mut request = valid();
        request.eyes = "b".into();

        match session.submit(request.clone()) {
            Err(SubmitError::Invalid(errors)) => assert_eq!(errors.keys().copied().collect::<Vec<_>>(), vec![Field::Eyes]),
            other => panic!("unexpected {:?}", other.map(|s| s.state)),
        }
        advance(100).await;

        let snap = session.snapshot();
        assert_eq!(generator.calls(), 0);
        assert_eq!(snap.state, SubmissionState::Idle);
        assert_eq!(snap.form, request);
        assert_eq!(snap.errors[&Field::Eyes], "Eye color must be at least 2 characters.");
        assert!(snap.submit_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_carries_each_submitted_value_verbatim() {
        let generator = FakeGenerator::new(Duration::ZERO, false);
        let session = Session::new(Uuid::new_v4(), generator.clone());
        let request = AvatarRequest {
            hair: "silver braided".into(),
            eyes: "hazel".into(),
            face_shape: "heart".into(),
            age: "61.5".into(),
            gender: "non-binary".into(),
            nationality: "Chilean".into(),
            occupation: "Glassblower".into(),
            dress: "a linen smock".into(),
            customer_type: "premium".into(),
        };
        let prompt = session.submit(request.clone()).unwrap().last_prompt.unwrap();
        for field in Field::ALL {
            assert!(prompt.contains(field.value(&request)), "{:?} missing from {}", field, prompt);
        }
        advance(10).await;
        assert_eq!(generator.prompts.lock().as_slice(), &[prompt]);
    }

    #[tokio::test(start_paused = true)]
    async fn recased_or_padded_values_are_rejected_before_any_request() {
        let generator = FakeGenerator::new(Duration::ZERO, false);
        let session = Session::new(Uuid::new_v4(), generator.clone());
        let mut request = valid();
        request.face_shape = "Round".into();
        request.gender = "Female".into();
        request.customer_type = "VIP".into();
        request.age = " 25 ".into();

        match session.submit(request) {
            Err(SubmitError::Invalid(errors)) => assert_eq!(
                errors.keys().copied().collect::<Vec<_>>(),
                vec![Field::FaceShape, Field::Age, Field::Gender, Field::CustomerType]
            ),
            other => panic!("unexpected {:?}", other.map(|s| s.state)),
        }
        advance(10).await;
        assert_eq!(generator.calls(), 0);
        assert_eq!(session.snapshot().last_prompt, None);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_submission_walks_through_cooldown() {
        let generator = FakeGenerator::new(Duration::from_millis(200), false);
        let session = Session::new(Uuid::new_v4(), generator.clone());

        let snap = session.submit(valid()).unwrap();
        assert_eq!(snap.state, SubmissionState::Submitting);
        assert!(snap.loading);
        assert!(!snap.submit_enabled);
        assert_eq!(snap.countdown, Some(20));
        assert_eq!(snap.countdown_label.as_deref(), Some("20 seconds left"));
        assert_eq!(snap.form, AvatarRequest::default());
        assert_eq!(
            snap.last_prompt.as_deref(),
            Some("A personalized avatar of a female person with long brown hair, blue eyes, an round face shape, aged around 25, of French nationality, working as a Designer, dressed in casual, and categorized as a vip customer.")
        );

        advance(500).await;
        let snap = session.snapshot();
        assert_eq!(generator.calls(), 1);
        assert_eq!(snap.state, SubmissionState::CoolingDown);
        assert!(!snap.loading);
        assert!(!snap.submit_enabled);
        assert_eq!(snap.toast, Toast { message: SUCCESS_MESSAGE.into(), kind: ToastKind::Success, visible: true });
        assert_eq!(snap.button_label, REGENERATE_LABEL);
        let image = snap.image.unwrap();
        assert_eq!(image.content_type, "image/png");
        assert!(session.image().is_some());

        // t = 3.5s: three ticks done, toast gone
        advance(3_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.countdown, Some(17));
        assert!(!snap.toast.visible);

        // t = 19.5s: one tick left
        advance(16_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.countdown, Some(1));
        assert!(!snap.submit_enabled);

        // t = 20.5s: cooldown over
        advance(1_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Idle);
        assert_eq!(snap.countdown, None);
        assert!(snap.submit_enabled);
        assert!(snap.image.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_submission_shows_error_and_still_cools_down() {
        let session = Session::new(Uuid::new_v4(), FakeGenerator::new(Duration::from_millis(200), true));
        session.submit(valid()).unwrap();

        advance(500).await;
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Error);
        assert!(snap.image.is_none());
        assert_eq!(snap.toast, Toast { message: FAILURE_MESSAGE.into(), kind: ToastKind::Error, visible: true });
        assert_eq!(snap.button_label, GENERATE_LABEL);
        assert!(!snap.submit_enabled);

        advance(20_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Idle);
        assert!(snap.submit_enabled);
        assert!(!snap.toast.visible);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_is_rejected_while_busy() {
        let generator = FakeGenerator::new(Duration::from_millis(200), false);
        let session = Session::new(Uuid::new_v4(), generator.clone());
        session.submit(valid()).unwrap();

        assert!(matches!(session.submit(valid()), Err(SubmitError::Busy)));
        advance(5_000).await;
        assert!(matches!(session.submit(valid()), Err(SubmitError::Busy)));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_keeps_control_disabled_past_the_countdown() {
        let session = Session::new(Uuid::new_v4(), FakeGenerator::new(Duration::from_secs(30), false));
        session.submit(valid()).unwrap();

        advance(25_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Submitting);
        assert_eq!(snap.countdown, None);
        assert!(snap.loading);
        assert!(!snap.submit_enabled);

        advance(6_000).await;
        let snap = session.snapshot();
        assert_eq!(snap.state, SubmissionState::Idle);
        assert!(snap.submit_enabled);
        assert!(snap.toast.visible);
        assert!(snap.image.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn new_submission_clears_previous_image_and_restarts_countdown() {
        let session = Session::new(Uuid::new_v4(), FakeGenerator::new(Duration::from_millis(200), false));
        session.submit(valid()).unwrap();
        advance(21_000).await;
        assert!(session.snapshot().image.is_some());

        let snap = session.submit(valid()).unwrap();
        assert!(snap.image.is_none());
        assert_eq!(snap.countdown, Some(20));
        assert_eq!(snap.button_label, GENERATE_LABEL);

        advance(500).await;
        assert!(session.snapshot().image.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_needs_idle_time_and_no_pending_work() {
        let session = Session::new(Uuid::new_v4(), FakeGenerator::new(Duration::ZERO, false));
        let ttl = Duration::from_secs(10);
        assert!(!session.is_expired(ttl));

        advance(11_000).await;
        assert!(session.is_expired(ttl));
        session.touch();
        assert!(!session.is_expired(ttl));

        session.submit(valid()).unwrap();
        advance(11_000).await;
        assert!(!session.is_expired(ttl), "cooling down");
        advance(10_000).await;
        assert!(session.is_expired(ttl));
    }

    #[test]
    fn older_toast_timer_does_not_hide_newer_toast() {
        let mut inner = SessionInner::default();
        let first = inner.show_toast(SUCCESS_MESSAGE, ToastKind::Success);
        let second = inner.show_toast(FAILURE_MESSAGE, ToastKind::Error);
        inner.hide_toast(first);
        assert!(inner.toast.visible);
        assert_eq!(inner.toast.kind, ToastKind::Error);
        inner.hide_toast(second);
        assert_eq!(inner.toast, Toast::default());
    }

    #[test]
    fn countdown_reaches_zero_after_twenty_ticks() {
        let mut inner = SessionInner::default();
        inner.begin(&valid());
        inner.settle(Err(GenerationError::Network("down".into())));
        let mut ticks = 0;
        while inner.tick() {
            ticks += 1;
        }
        assert_eq!(ticks + 1, COOLDOWN_TICKS);
        assert_eq!(inner.countdown, 0);
        assert_eq!(inner.state, SubmissionState::Idle);
        assert!(inner.submit_enabled());
    }
}
