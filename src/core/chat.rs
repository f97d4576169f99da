//! Chat engine: intake and retrieval-grounded answering
//!
//! The ChatEngine is the core of MediQ. For each inbound message it:
//! 1. Loads or creates the session
//! 2. Runs one intake step while the patient profile is incomplete
//! 3. Otherwise retrieves grounding passages for the question
//! 4. Builds a prompt from the profile, the passages, and the history
//! 5. Asks the generation provider, applying the fixed fallback replies
//! 6. Persists the session and returns exactly one reply string
//!
//! Requests for the same session are serialized through a per-session lock,
//! so turns land in the log in arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::PromptSet;
use crate::conversation::Turn;
use crate::core::intake::{self, IntakeOutcome};
use crate::core::store::{Session, SessionStore, StoreError};
use crate::providers::{AnswerGenerator, GeneratorError};
use crate::retrieval::Retriever;

/// Request to the chat engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Session to continue; a fresh one is created when omitted
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Response from the chat engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Session ID for continuation
    pub session_id: String,

    /// The single reply for this turn
    pub reply: String,
}

/// Errors from the chat engine
///
/// Conversational failures (no grounding, provider quota, generation or
/// retrieval faults) never surface here; they all map to fixed replies.
/// Only session-store faults escape.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// The core chat engine
pub struct ChatEngine {
    store: Arc<dyn SessionStore>,
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn AnswerGenerator>,
    prompts: PromptSet,
    top_k: usize,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
        prompts: PromptSet,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
            prompts,
            top_k,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Process one message and return the reply for this turn.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let session_id = request
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let lock = self.lock_for(&session_id).await;
        let _guard = lock.lock().await;

        let input = request.message.trim().to_string();

        let Some(mut session) = self.store.load(&session_id).await? else {
            // Brand-new session: greet and start intake. The first message
            // is not consumed as an answer to anything.
            self.store.create(&session_id).await?;
            tracing::debug!(%session_id, "new session, starting intake");
            return Ok(ChatResponse {
                session_id,
                reply: self.prompts.greeting.clone(),
            });
        };

        if !session.profile.is_complete() {
            match intake::advance(&mut session.profile, &input, &self.prompts) {
                IntakeOutcome::Advance(prompt) => {
                    self.store.commit(&session.id, &session.profile, &[]).await?;
                    return Ok(ChatResponse {
                        session_id,
                        reply: prompt,
                    });
                }
                IntakeOutcome::Retry(prompt) => {
                    return Ok(ChatResponse {
                        session_id,
                        reply: prompt,
                    });
                }
                IntakeOutcome::Complete => {}
            }
        }

        let reply = self.answer(&mut session, &input).await?;

        Ok(ChatResponse { session_id, reply })
    }

    /// Retrieval-augmented answer for a completed profile.
    async fn answer(&self, session: &mut Session, question: &str) -> Result<String, ChatError> {
        let passages = match self.retriever.search(question, self.top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "retrieval failed");
                return Ok(self.prompts.reply_retrieval_down.clone());
            }
        };

        // Grounding gate: without retrieved context there is nothing to
        // answer from, and the generator is not consulted.
        if passages.is_empty() {
            return Ok(self.prompts.reply_no_grounding.clone());
        }

        let context = passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        session.memory.push_user(question);
        let history = session.memory.render_history(1);

        let prompt = self.build_prompt(&session.profile.prompt_block(), &context, &history, question);

        let reply = match self.generator.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    self.prompts.reply_blank_answer.clone()
                } else {
                    text
                }
            }
            Err(GeneratorError::QuotaExceeded) => {
                tracing::warn!(session_id = %session.id, "generation quota exceeded");
                self.prompts.reply_quota.clone()
            }
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "generation failed");
                self.prompts.reply_generation_failed.clone()
            }
        };

        session.memory.push_bot(&reply);

        let new_turns: Vec<Turn> = session.memory.turns()[session.memory.len() - 2..].to_vec();
        self.store
            .commit(&session.id, &session.profile, &new_turns)
            .await?;

        Ok(reply)
    }

    fn build_prompt(
        &self,
        profile_block: &str,
        context: &str,
        history: &str,
        question: &str,
    ) -> String {
        format!(
            "{}\n\n{}\n\nContext:\n{}\n\nConversation so far:\n{}\n\nQuestion: {}\n{}",
            self.prompts.answer_instruction,
            profile_block,
            context,
            history,
            question,
            self.prompts.answer_style,
        )
    }

    /// Clear the session's profile and conversation in one step.
    pub async fn reset(&self, session_id: &str) -> Result<String, ChatError> {
        let lock = self.lock_for(session_id).await;
        {
            let _guard = lock.lock().await;
            self.store.clear(session_id).await?;
            tracing::debug!(%session_id, "session reset");
        }

        self.session_locks.lock().await.remove(session_id);

        Ok(self.prompts.reply_reset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::SqliteSessionStore;
    use crate::providers::GeneratorError;
    use crate::retrieval::{Passage, RetrievalError};
    use async_trait::async_trait;

    struct FixedRetriever {
        passages: Vec<Passage>,
    }

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
            Ok(self.passages.clone())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
            Err(RetrievalError::InvalidResponse("503: index down".into()))
        }
    }

    enum MockGeneration {
        Reply(String),
        Quota,
        Fail,
    }

    struct MockGenerator {
        behavior: MockGeneration,
        seen_prompts: std::sync::Mutex<Vec<String>>,
    }

    impl MockGenerator {
        fn replying(text: &str) -> Self {
            Self {
                behavior: MockGeneration::Reply(text.to_string()),
                seen_prompts: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for MockGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
            self.seen_prompts.lock().unwrap().push(prompt.to_string());
            match &self.behavior {
                MockGeneration::Reply(text) => Ok(text.clone()),
                MockGeneration::Quota => Err(GeneratorError::QuotaExceeded),
                MockGeneration::Fail => {
                    Err(GeneratorError::InvalidResponse("500: boom".into()))
                }
            }
        }
    }

    fn ibuprofen_passage() -> Vec<Passage> {
        vec![Passage {
            text: "Ibuprofen reduces pain and inflammation.".into(),
            score: 0.9,
        }]
    }

    async fn engine_with(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> (ChatEngine, Arc<dyn SessionStore>) {
        let store: Arc<dyn SessionStore> =
            Arc::new(SqliteSessionStore::new_in_memory().await.unwrap());
        let engine = ChatEngine::new(
            store.clone(),
            retriever,
            generator,
            PromptSet::default(),
            3,
        );
        (engine, store)
    }

    async fn send(engine: &ChatEngine, session_id: &str, message: &str) -> String {
        engine
            .chat(ChatRequest {
                message: message.to_string(),
                session_id: Some(session_id.to_string()),
            })
            .await
            .unwrap()
            .reply
    }

    /// Walks a session through the whole intake sequence.
    async fn complete_intake(engine: &ChatEngine, session_id: &str) {
        send(engine, session_id, "start").await; // greeting
        send(engine, session_id, "Alice").await;
        send(engine, session_id, "30").await;
        send(engine, session_id, "70").await;
        send(engine, session_id, "170").await;
        send(engine, session_id, "O+").await;
    }

    #[tokio::test]
    async fn test_intake_then_grounded_answer() {
        let generator = Arc::new(MockGenerator::replying(
            "Ibuprofen reduces pain and inflammation. It is commonly used for headaches.",
        ));
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator.clone(),
        )
        .await;

        let prompts = PromptSet::default();

        let reply = send(&engine, "s1", "hi").await;
        assert_eq!(reply, prompts.greeting);

        let reply = send(&engine, "s1", "Alice").await;
        assert_eq!(reply, prompts.ask_age);

        // Invalid age re-prompts without advancing
        let reply = send(&engine, "s1", "abc").await;
        assert_eq!(reply, prompts.invalid_age);
        let reply = send(&engine, "s1", "30").await;
        assert_eq!(reply, prompts.ask_weight);

        let reply = send(&engine, "s1", "70").await;
        assert_eq!(reply, prompts.ask_height);
        let reply = send(&engine, "s1", "170").await;
        assert_eq!(reply, prompts.ask_blood_group);

        let reply = send(&engine, "s1", "O+").await;
        assert!(reply.contains("Alice"));

        // Intake never touched the conversation log
        let session = store.load("s1").await.unwrap().unwrap();
        assert!(session.memory.is_empty());
        assert!(session.profile.is_complete());

        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert!(reply.contains("Ibuprofen"));

        let session = store.load("s1").await.unwrap().unwrap();
        assert_eq!(session.memory.len(), 2);
        assert_eq!(session.memory.turns()[0].content, "What treats a headache?");
        assert_eq!(session.memory.turns()[1].content, reply);
    }

    #[tokio::test]
    async fn test_grounding_gate_empty_retrieval() {
        let generator = Arc::new(MockGenerator::replying("should never be called"));
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever { passages: vec![] }),
            generator.clone(),
        )
        .await;

        complete_intake(&engine, "s1").await;

        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert_eq!(reply, "I don't know, sorry.");

        // No generator call, no memory growth
        assert!(generator.seen_prompts.lock().unwrap().is_empty());
        let session = store.load("s1").await.unwrap().unwrap();
        assert_eq!(session.memory.len(), 0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_reply() {
        let generator = Arc::new(MockGenerator::replying("unused"));
        let (engine, store) = engine_with(Arc::new(FailingRetriever), generator).await;

        complete_intake(&engine, "s1").await;

        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert_eq!(reply, PromptSet::default().reply_retrieval_down);

        let session = store.load("s1").await.unwrap().unwrap();
        assert_eq!(session.memory.len(), 0);
    }

    #[tokio::test]
    async fn test_quota_fallback_recorded_in_memory() {
        let generator = Arc::new(MockGenerator {
            behavior: MockGeneration::Quota,
            seen_prompts: std::sync::Mutex::new(Vec::new()),
        });
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator,
        )
        .await;

        complete_intake(&engine, "s1").await;

        let prompts = PromptSet::default();
        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert_eq!(reply, prompts.reply_quota);

        // The fallback is still recorded as the bot turn
        let session = store.load("s1").await.unwrap().unwrap();
        assert_eq!(session.memory.len(), 2);
        assert_eq!(session.memory.turns()[1].content, prompts.reply_quota);
    }

    #[tokio::test]
    async fn test_generation_failure_fallback() {
        let generator = Arc::new(MockGenerator {
            behavior: MockGeneration::Fail,
            seen_prompts: std::sync::Mutex::new(Vec::new()),
        });
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator,
        )
        .await;

        complete_intake(&engine, "s1").await;

        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert_eq!(reply, PromptSet::default().reply_generation_failed);

        let session = store.load("s1").await.unwrap().unwrap();
        assert_eq!(session.memory.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_generation_fallback() {
        let generator = Arc::new(MockGenerator::replying("   \n  "));
        let (engine, _store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator,
        )
        .await;

        complete_intake(&engine, "s1").await;

        let reply = send(&engine, "s1", "What treats a headache?").await;
        assert_eq!(reply, PromptSet::default().reply_blank_answer);
    }

    #[tokio::test]
    async fn test_prompt_composition_order() {
        let generator = Arc::new(MockGenerator::replying("An answer."));
        let (engine, _store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator.clone(),
        )
        .await;

        complete_intake(&engine, "s1").await;
        send(&engine, "s1", "What treats a headache?").await;

        let prompts = generator.seen_prompts.lock().unwrap();
        let prompt = &prompts[0];

        let instruction_at = prompt.find("medical AI assistant").unwrap();
        let profile_at = prompt.find("Patient name: Alice").unwrap();
        let context_at = prompt.find("Ibuprofen reduces pain").unwrap();
        let question_at = prompt.find("Question: What treats a headache?").unwrap();
        let style_at = prompt.find("Answer in 2-3 sentences:").unwrap();

        assert!(instruction_at < profile_at);
        assert!(profile_at < context_at);
        assert!(context_at < question_at);
        assert!(question_at < style_at);
        assert!(prompt.contains("Age: 30"));
        assert!(prompt.contains("Blood group: O+"));
    }

    #[tokio::test]
    async fn test_history_included_on_followup() {
        let generator = Arc::new(MockGenerator::replying("Because it inhibits prostaglandins."));
        let (engine, _store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator.clone(),
        )
        .await;

        complete_intake(&engine, "s1").await;
        send(&engine, "s1", "What treats a headache?").await;
        send(&engine, "s1", "Why does it work?").await;

        let prompts = generator.seen_prompts.lock().unwrap();
        let second = &prompts[1];
        assert!(second.contains("User: What treats a headache?"));
        assert!(second.contains("Bot: Because it inhibits prostaglandins."));
        // The current question is not duplicated into the history block
        assert!(!second.contains("User: Why does it work?"));
    }

    #[tokio::test]
    async fn test_reset_restarts_intake() {
        let generator = Arc::new(MockGenerator::replying("unused"));
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever {
                passages: ibuprofen_passage(),
            }),
            generator,
        )
        .await;

        complete_intake(&engine, "s1").await;

        let confirmation = engine.reset("s1").await.unwrap();
        assert_eq!(confirmation, PromptSet::default().reply_reset);
        assert!(store.load("s1").await.unwrap().is_none());

        // Next message starts over with the greeting
        let reply = send(&engine, "s1", "hello again").await;
        assert_eq!(reply, PromptSet::default().greeting);
    }

    #[tokio::test]
    async fn test_generated_session_id() {
        let generator = Arc::new(MockGenerator::replying("unused"));
        let (engine, store) = engine_with(
            Arc::new(FixedRetriever { passages: vec![] }),
            generator,
        )
        .await;

        let response = engine
            .chat(ChatRequest {
                message: "hi".into(),
                session_id: None,
            })
            .await
            .unwrap();

        assert!(!response.session_id.is_empty());
        assert!(store.load(&response.session_id).await.unwrap().is_some());
    }
}
