//! Interactive question relay
//!
//! Engines can raise questions mid-operation (license confirmations,
//! overwrite prompts). The relay answers each one exactly once: yes/no and
//! continue/cancel questions become two-action desktop prompts, everything
//! else is discarded with an explicit invalid response because these handlers
//! have no way to collect free-form input.
//!
//! The relay never blocks. Prompt outcomes come back as loop events, and the
//! relay is driven purely by `handle_*` calls from the event loop.

use crate::services::{NotificationSink, PromptId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strum::Display;
use tracing::debug;

/// Identifies one question raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub u64);

/// The decision shapes an engine can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    ContinueCancel,
    InputText,
    SelectFromList,
    Password,
}

/// The answer delivered back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionResponse {
    Yes,
    No,
    Continue,
    Cancel,
    /// "Cannot answer" / dismissed without a choice.
    Invalid,
}

/// A question as raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub kind: QuestionKind,
    pub title: String,
    pub body: String,
}

/// Delivers responses back to the asking engine.
///
/// Passed to the relay at construction; nothing here is process-global.
pub trait QuestionBus {
    fn set_response(&mut self, question: QuestionId, response: QuestionResponse);
}

struct PendingPrompt {
    question: QuestionId,
    kind: QuestionKind,
}

/// Answers engine questions through desktop prompts, exactly once each.
pub struct QuestionRelay<B: QuestionBus, N: NotificationSink> {
    bus: B,
    sink: N,
    pending: HashMap<PromptId, PendingPrompt>,
    answered: HashSet<QuestionId>,
}

impl<B: QuestionBus, N: NotificationSink> QuestionRelay<B, N> {
    pub fn new(bus: B, sink: N) -> Self {
        Self {
            bus,
            sink,
            pending: HashMap::new(),
            answered: HashSet::new(),
        }
    }

    /// React to a question raised by the engine.
    pub fn handle_question(&mut self, question: Question) {
        if self.answered.contains(&question.id) {
            debug!(question = question.id.0, "duplicate question delivery ignored");
            return;
        }
        match question.kind {
            QuestionKind::YesNo => {
                let prompt = self
                    .sink
                    .present(&question.title, &question.body, &["Yes", "No"]);
                self.pending.insert(
                    prompt,
                    PendingPrompt {
                        question: question.id,
                        kind: question.kind,
                    },
                );
            }
            QuestionKind::ContinueCancel => {
                let prompt =
                    self.sink
                        .present(&question.title, &question.body, &["Continue", "Cancel"]);
                self.pending.insert(
                    prompt,
                    PendingPrompt {
                        question: question.id,
                        kind: question.kind,
                    },
                );
            }
            QuestionKind::InputText | QuestionKind::SelectFromList | QuestionKind::Password => {
                // Unanswerable without an input surface; discard explicitly
                // so the engine can continue.
                debug!(kind = %question.kind, "discarding unsupported question");
                self.respond(question.id, QuestionResponse::Invalid);
            }
        }
    }

    /// React to the user activating action `action` (0-based) on a prompt.
    pub fn handle_prompt_action(&mut self, prompt: PromptId, action: usize) {
        let Some(pending) = self.pending.remove(&prompt) else {
            debug!(%prompt, "action on unknown or already-settled prompt ignored");
            return;
        };
        let response = match (pending.kind, action) {
            (QuestionKind::YesNo, 0) => QuestionResponse::Yes,
            (QuestionKind::YesNo, 1) => QuestionResponse::No,
            (QuestionKind::ContinueCancel, 0) => QuestionResponse::Continue,
            (QuestionKind::ContinueCancel, 1) => QuestionResponse::Cancel,
            _ => QuestionResponse::Invalid,
        };
        self.respond(pending.question, response);
    }

    /// React to a prompt being dismissed without a choice.
    pub fn handle_prompt_closed(&mut self, prompt: PromptId) {
        let Some(pending) = self.pending.remove(&prompt) else {
            // Closed after an action was taken; the response is already set.
            return;
        };
        self.respond(pending.question, QuestionResponse::Invalid);
    }

    /// Deliver a response exactly once per question id.
    fn respond(&mut self, question: QuestionId, response: QuestionResponse) {
        if !self.answered.insert(question) {
            debug!(question = question.0, "response already set, ignoring");
            return;
        }
        debug!(question = question.0, %response, "answering question");
        self.bus.set_response(question, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingBus {
        responses: Rc<RefCell<Vec<(QuestionId, QuestionResponse)>>>,
    }

    impl QuestionBus for RecordingBus {
        fn set_response(&mut self, question: QuestionId, response: QuestionResponse) {
            self.responses.borrow_mut().push((question, response));
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        prompts: Rc<RefCell<Vec<(String, Vec<String>)>>>,
        next: u64,
    }

    impl NotificationSink for RecordingSink {
        fn present(&mut self, title: &str, _body: &str, actions: &[&str]) -> PromptId {
            self.prompts.borrow_mut().push((
                title.to_string(),
                actions.iter().map(|a| a.to_string()).collect(),
            ));
            let id = PromptId(self.next);
            self.next += 1;
            id
        }
    }

    fn relay() -> (
        QuestionRelay<RecordingBus, RecordingSink>,
        Rc<RefCell<Vec<(QuestionId, QuestionResponse)>>>,
        Rc<RefCell<Vec<(String, Vec<String>)>>>,
    ) {
        let bus = RecordingBus::default();
        let sink = RecordingSink::default();
        let responses = Rc::clone(&bus.responses);
        let prompts = Rc::clone(&sink.prompts);
        (QuestionRelay::new(bus, sink), responses, prompts)
    }

    fn question(id: u64, kind: QuestionKind) -> Question {
        Question {
            id: QuestionId(id),
            kind,
            title: "Install content?".into(),
            body: "The entry wants to run an install script.".into(),
        }
    }

    #[test]
    fn test_yes_no_question_presents_two_actions() {
        let (mut relay, responses, prompts) = relay();
        relay.handle_question(question(1, QuestionKind::YesNo));

        assert_eq!(prompts.borrow().len(), 1);
        assert_eq!(prompts.borrow()[0].1, vec!["Yes", "No"]);
        assert!(responses.borrow().is_empty(), "no response before action");

        relay.handle_prompt_action(PromptId(0), 0);
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(1), QuestionResponse::Yes)]
        );
    }

    #[test]
    fn test_yes_no_second_action_is_no() {
        let (mut relay, responses, _) = relay();
        relay.handle_question(question(1, QuestionKind::YesNo));
        relay.handle_prompt_action(PromptId(0), 1);
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(1), QuestionResponse::No)]
        );
    }

    #[test]
    fn test_continue_cancel_actions() {
        let (mut relay, responses, prompts) = relay();
        relay.handle_question(question(7, QuestionKind::ContinueCancel));
        assert_eq!(prompts.borrow()[0].1, vec!["Continue", "Cancel"]);

        relay.handle_prompt_action(PromptId(0), 1);
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(7), QuestionResponse::Cancel)]
        );
    }

    #[test]
    fn test_unsupported_kinds_are_discarded_without_prompt() {
        for kind in [
            QuestionKind::InputText,
            QuestionKind::SelectFromList,
            QuestionKind::Password,
        ] {
            let (mut relay, responses, prompts) = relay();
            relay.handle_question(question(3, kind));
            assert!(prompts.borrow().is_empty(), "{kind} must not prompt");
            assert_eq!(
                responses.borrow().as_slice(),
                &[(QuestionId(3), QuestionResponse::Invalid)]
            );
        }
    }

    #[test]
    fn test_dismissed_prompt_yields_invalid() {
        let (mut relay, responses, _) = relay();
        relay.handle_question(question(2, QuestionKind::YesNo));
        relay.handle_prompt_closed(PromptId(0));
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(2), QuestionResponse::Invalid)]
        );
    }

    #[test]
    fn test_close_after_action_does_not_double_respond() {
        let (mut relay, responses, _) = relay();
        relay.handle_question(question(2, QuestionKind::YesNo));
        relay.handle_prompt_action(PromptId(0), 0);
        relay.handle_prompt_closed(PromptId(0));
        assert_eq!(responses.borrow().len(), 1);
    }

    #[test]
    fn test_duplicate_question_delivery_is_answered_once() {
        let (mut relay, responses, prompts) = relay();
        relay.handle_question(question(5, QuestionKind::InputText));
        relay.handle_question(question(5, QuestionKind::InputText));
        assert_eq!(responses.borrow().len(), 1);
        assert!(prompts.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_prompt_action_is_ignored() {
        let (mut relay, responses, _) = relay();
        relay.handle_question(question(9, QuestionKind::ContinueCancel));
        relay.handle_prompt_action(PromptId(0), 0);
        relay.handle_prompt_action(PromptId(0), 1);
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(9), QuestionResponse::Continue)]
        );
    }

    #[test]
    fn test_unknown_prompt_action_index_maps_to_invalid() {
        let (mut relay, responses, _) = relay();
        relay.handle_question(question(4, QuestionKind::YesNo));
        relay.handle_prompt_action(PromptId(0), 5);
        assert_eq!(
            responses.borrow().as_slice(),
            &[(QuestionId(4), QuestionResponse::Invalid)]
        );
    }
}
