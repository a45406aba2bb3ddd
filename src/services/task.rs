use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::services::assistant::{Completion, Transcription};

/// Which entitlement bucket pays for a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaSource {
    Subscription,
    Bonus,
    Daily,
}

impl fmt::Display for QuotaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaSource::Subscription => write!(f, "subscription"),
            QuotaSource::Bonus => write!(f, "bonus"),
            QuotaSource::Daily => write!(f, "daily"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation-local state of one task run. Carried by value inside the
/// dialogue state, so everything here must serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSession {
    pub telegram_user_id: u64,
    pub question: String,
    pub image_base64: Option<String>,
    pub had_image: bool,
    pub had_voice: bool,
    pub quota_source: QuotaSource,

    /// Interview and plan-modification exchange, in chronological order.
    pub exchange: Vec<ChatMessage>,
    pub interview_question: Option<String>,
    pub interview_options: Option<Vec<String>>,
    pub plan: Option<String>,
    pub skip_plan: bool,
    /// Bumped on every plan generation; the confirmation timeout only fires
    /// if the round it was armed for is still current.
    pub plan_round: u32,

    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub transcription_prompt_tokens: u64,
    pub transcription_completion_tokens: u64,
    pub transcription_cost_usd: f64,
}

impl TaskSession {
    pub fn new(telegram_user_id: u64, question: impl Into<String>, quota_source: QuotaSource) -> Self {
        Self {
            telegram_user_id,
            question: question.into(),
            image_base64: None,
            had_image: false,
            had_voice: false,
            quota_source,
            exchange: Vec::new(),
            interview_question: None,
            interview_options: None,
            plan: None,
            skip_plan: false,
            plan_round: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            transcription_prompt_tokens: 0,
            transcription_completion_tokens: 0,
            transcription_cost_usd: 0.0,
        }
    }

    pub fn with_image(mut self, image_base64: String) -> Self {
        self.image_base64 = Some(image_base64);
        self.had_image = true;
        self
    }

    pub fn record_transcription(&mut self, transcription: &Transcription) {
        self.had_voice = true;
        self.transcription_prompt_tokens += transcription.prompt_tokens as u64;
        self.transcription_completion_tokens += transcription.completion_tokens as u64;
        self.transcription_cost_usd += transcription.cost_usd;
    }

    pub fn record_stage(&mut self, completion: &Completion) {
        self.prompt_tokens += completion.prompt_tokens as u64;
        self.completion_tokens += completion.completion_tokens as u64;
    }

    /// Interview question + the user's answer, appended in order.
    pub fn record_interview_answer(&mut self, answer: &str) {
        let question = self.interview_question.take().unwrap_or_default();
        self.exchange.push(ChatMessage::assistant(question));
        self.exchange.push(ChatMessage::user(answer));
        self.interview_options = None;
    }

    pub fn record_plan_modification(&mut self, request: &str) {
        self.exchange.push(ChatMessage::user(format!("Измени план: {request}")));
    }

    /// Context for the plan stage: original question followed by the
    /// interview exchange.
    pub fn plan_context(&self) -> Vec<ChatMessage> {
        let mut context = vec![ChatMessage::user(self.question.clone())];
        context.extend(self.exchange.iter().cloned());
        context
    }

    /// Context for the solve stage: plan context plus the confirmed plan,
    /// unless the plan stage was skipped.
    pub fn solve_context(&self) -> Vec<ChatMessage> {
        let mut context = self.plan_context();
        if let Some(plan) = self.plan.as_ref().filter(|_| !self.skip_plan) {
            context.push(ChatMessage::assistant(format!("План решения:\n{plan}")));
            context.push(ChatMessage::user("Отлично, теперь реши задачу по этому плану"));
        }
        context
    }

    pub fn total_prompt_tokens(&self) -> u64 {
        self.prompt_tokens + self.transcription_prompt_tokens
    }

    pub fn total_completion_tokens(&self) -> u64 {
        self.completion_tokens + self.transcription_completion_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens() + self.total_completion_tokens()
    }
}

/// Everything the ledger persists for one completed run.
#[derive(Debug, Clone)]
pub struct NewTaskRecord {
    pub question: String,
    pub answer: String,
    pub detected_subject: Option<String>,
    pub model_used: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub response_time_ms: u64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_all_tokens: u64,
    pub cost_usd: f64,
    pub had_image: bool,
    pub had_voice: bool,
}

/// Accumulation happens on raw f64; rounding is applied only when a value is
/// displayed, never before storage.
pub fn calculate_cost(
    prompt_tokens: u64,
    completion_tokens: u64,
    transcription_cost_usd: f64,
    pricing: &PricingConfig,
) -> f64 {
    prompt_tokens as f64 * pricing.input_price
        + completion_tokens as f64 * pricing.output_price
        + transcription_cost_usd
}

/// At most one pipeline run per user. The transport already serializes
/// updates per chat, but the dispatcher may run handlers for the same user
/// concurrently, so the guarantee is made explicit here.
#[derive(Clone, Default)]
pub struct PipelineGuard {
    active: Arc<DashMap<u64, ()>>,
}

impl PipelineGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the user's slot for the duration of one stage. Returns `None`
    /// if a stage is already in flight for this user.
    pub fn try_begin(&self, telegram_user_id: u64) -> Option<PipelineSlot> {
        use dashmap::mapref::entry::Entry;

        match self.active.entry(telegram_user_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(PipelineSlot {
                    active: Arc::clone(&self.active),
                    telegram_user_id,
                })
            }
        }
    }
}

pub struct PipelineSlot {
    active: Arc<DashMap<u64, ()>>,
    telegram_user_id: u64,
}

impl Drop for PipelineSlot {
    fn drop(&mut self) {
        self.active.remove(&self.telegram_user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assistant::Completion;

    fn completion(prompt: u32, completion: u32) -> Completion {
        Completion {
            text: String::new(),
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            response_time_ms: 0,
            model: "test".to_string(),
        }
    }

    #[test]
    fn cost_is_deterministic() {
        let pricing = PricingConfig {
            input_price: 0.0000005,
            output_price: 0.000003,
            transcription_input_price: 0.0,
            transcription_output_price: 0.0,
        };

        let cost = calculate_cost(1000, 500, 0.0, &pricing);
        assert!((cost - 0.002).abs() < 1e-12);
    }

    #[test]
    fn cost_includes_transcription() {
        let pricing = PricingConfig {
            input_price: 0.000001,
            output_price: 0.000002,
            transcription_input_price: 0.0,
            transcription_output_price: 0.0,
        };

        let cost = calculate_cost(100, 100, 0.0005, &pricing);
        assert!((cost - 0.0008).abs() < 1e-12);
    }

    #[test]
    fn tokens_accumulate_across_stages() {
        let mut session = TaskSession::new(1, "question", QuotaSource::Daily);
        session.record_stage(&completion(100, 50));
        session.record_stage(&completion(200, 80));

        assert_eq!(session.prompt_tokens, 300);
        assert_eq!(session.completion_tokens, 130);
        assert_eq!(session.total_tokens(), 430);
    }

    #[test]
    fn transcription_tokens_count_towards_totals() {
        let mut session = TaskSession::new(1, "q", QuotaSource::Bonus);
        session.record_transcription(&Transcription {
            text: "hello".to_string(),
            prompt_tokens: 40,
            completion_tokens: 10,
            cost_usd: 0.0001,
        });
        session.record_stage(&completion(100, 50));

        assert_eq!(session.total_prompt_tokens(), 140);
        assert_eq!(session.total_completion_tokens(), 60);
        assert!(session.had_voice);
        assert!((session.transcription_cost_usd - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn solve_context_preserves_chronological_order() {
        let mut session = TaskSession::new(1, "Вопрос", QuotaSource::Daily);
        session.interview_question = Some("Какой класс?".to_string());
        session.record_interview_answer("9 класс");
        session.record_plan_modification("короче");
        session.plan = Some("1. Шаг".to_string());

        let context = session.solve_context();
        assert_eq!(context[0], ChatMessage::user("Вопрос"));
        assert_eq!(context[1], ChatMessage::assistant("Какой класс?"));
        assert_eq!(context[2], ChatMessage::user("9 класс"));
        assert_eq!(context[3], ChatMessage::user("Измени план: короче"));
        assert_eq!(context[4], ChatMessage::assistant("План решения:\n1. Шаг"));
        assert_eq!(context[5], ChatMessage::user("Отлично, теперь реши задачу по этому плану"));
    }

    #[test]
    fn skipped_plan_is_left_out_of_solve_context() {
        let mut session = TaskSession::new(1, "Вопрос", QuotaSource::Daily);
        session.plan = Some("старый план".to_string());
        session.skip_plan = true;

        let context = session.solve_context();
        assert_eq!(context.len(), 1);
        assert_eq!(context[0], ChatMessage::user("Вопрос"));
    }

    #[test]
    fn pipeline_guard_rejects_second_run() {
        let guard = PipelineGuard::new();

        let slot = guard.try_begin(42).expect("first claim succeeds");
        assert!(guard.try_begin(42).is_none());
        assert!(guard.try_begin(7).is_some(), "other users are unaffected");

        drop(slot);
        assert!(guard.try_begin(42).is_some(), "slot is free after drop");
    }
}
