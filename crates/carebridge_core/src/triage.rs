//! Triage walker
//!
//! A per-user cursor over the [`QuestionGraph`]. Each incoming answer is
//! matched against the localized labels of the current node's options; a
//! match advances the cursor, anything else re-prompts with the same options.
//! When the cursor reaches a terminal node the walk completes with a summary
//! of every answered question in visit order.
//!
//! Multichoice nodes collect several choices before moving on. The finish
//! token (a catalog id, localized like any other label) closes the selection
//! and follows the node's single outgoing edge.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::catalog::StringCatalog;
use crate::category::{Handoff, RequestCategory};
use crate::error::{CoreError, Result};
use crate::graph::{NodeId, QuestionGraph};

/// Joins the choices of a multichoice answer
pub const SELECTION_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageSettings {
    /// Language used when a session has no (known) language of its own
    pub default_language: String,

    /// Catalog id of the label that closes a multichoice selection
    pub finish_answer_id: String,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            finish_answer_id: "a_done".to_string(),
        }
    }
}

/// A rendered question: prompt text plus the option labels to offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
}

/// One answered question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub node: NodeId,
    pub prompt: String,
    pub answer: String,
}

/// Result of a completed walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageSummary {
    /// `"<prompt>: <answer>"` lines in visit order
    pub text: String,
    pub answers: Vec<RecordedAnswer>,
    /// Terminal node the walk ended on
    pub terminal: NodeId,
    /// Kind of help the walk asks for, if any
    pub category: Option<RequestCategory>,
    /// Room the ending is passed on to without a request
    pub handoff: Option<Handoff>,
    /// Rendered prompt of the terminal node, when it has one
    pub closing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkerOutcome {
    /// The input matched no option; the same question is asked again
    Reprompt(Question),
    /// The input was accepted and this is the question to ask now
    NextQuestion(Question),
    /// The graph is exhausted
    Completed(TriageSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageState {
    AwaitingFirstAnswer {
        start: NodeId,
    },
    AwaitingAnswer {
        current: NodeId,
        /// Choices picked so far on a multichoice node
        selection: Option<Vec<String>>,
    },
    Completed(TriageSummary),
}

/// Per-user walk state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriageSession {
    language: String,
    state: TriageState,
    /// Node → answer text, in the order nodes were first answered
    collected_answers: Vec<(NodeId, String)>,
}

impl TriageSession {
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn state(&self) -> &TriageState {
        &self.state
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        match &self.state {
            TriageState::AwaitingFirstAnswer { start } => Some(start),
            TriageState::AwaitingAnswer { current, .. } => Some(current),
            TriageState::Completed(_) => None,
        }
    }

    pub fn collected_answers(&self) -> &[(NodeId, String)] {
        &self.collected_answers
    }

    pub fn answer(&self, node: &str) -> Option<&str> {
        self.collected_answers
            .iter()
            .find(|(id, _)| id.as_str() == node)
            .map(|(_, answer)| answer.as_str())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, TriageState::Completed(_))
    }

    fn record(&mut self, node: &NodeId, answer: String) {
        match self.collected_answers.iter_mut().find(|(id, _)| id == node) {
            Some((_, existing)) => *existing = answer,
            None => self.collected_answers.push((node.clone(), answer)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriageWalker {
    graph: Arc<QuestionGraph>,
    catalog: Arc<StringCatalog>,
    settings: TriageSettings,
}

impl TriageWalker {
    /// Check that every label the graph needs can be rendered and that the
    /// finish token never collides with a multichoice choice.
    pub fn new(
        graph: Arc<QuestionGraph>,
        catalog: Arc<StringCatalog>,
        settings: TriageSettings,
    ) -> Result<Self> {
        let walker = Self {
            graph,
            catalog,
            settings,
        };
        walker.validate()?;
        Ok(walker)
    }

    fn validate(&self) -> Result<()> {
        let default = self.settings.default_language.as_str();
        self.catalog.require_language(default)?;

        let missing = |id: &str| CoreError::MissingString {
            language: default.to_string(),
            id: id.to_string(),
        };
        let has = |id: &str| self.catalog.resolve(default, id).is_some();

        if self.graph.nodes().any(|node| node.multichoice) && !has(&self.settings.finish_answer_id)
        {
            return Err(missing(&self.settings.finish_answer_id));
        }

        for node in self.graph.nodes() {
            let id = node.id.as_str();
            if let Some(prompt) = &node.prompt {
                if !has(prompt.as_str()) {
                    return Err(missing(prompt.as_str()));
                }
            }
            if node.multichoice {
                if let Some(choice) = node.choices.iter().find(|c| !has(c.as_str())) {
                    return Err(missing(choice.as_str()));
                }
            } else if let Some(edge) = self
                .graph
                .outgoing_edges(id)
                .iter()
                .find(|e| !has(e.answer.as_str()))
            {
                return Err(missing(edge.answer.as_str()));
            }
        }

        for language in self.catalog.languages() {
            let finish = self.label(language, &self.settings.finish_answer_id);
            for node in self.graph.nodes().filter(|node| node.multichoice) {
                if let Some(choice) = node
                    .choices
                    .iter()
                    .map(|c| self.label(language, c))
                    .find(|label| *label == finish)
                {
                    return Err(CoreError::FinishTokenCollision {
                        language: language.to_string(),
                        node: node.id.to_string(),
                        label: choice,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn graph(&self) -> &QuestionGraph {
        &self.graph
    }

    pub fn settings(&self) -> &TriageSettings {
        &self.settings
    }

    /// Begin a walk at the graph's start node
    pub fn start(&self, language: Option<&str>) -> (TriageSession, Question) {
        let language = match language {
            Some(lang) if self.catalog.has_language(lang) => lang.to_string(),
            _ => self.settings.default_language.clone(),
        };
        let start = self.graph.start().clone();
        let question = self.question_at(&language, &start, &[]);

        debug!(start = %start, language = %language, "Starting triage");
        let session = TriageSession {
            language,
            state: TriageState::AwaitingFirstAnswer { start },
            collected_answers: Vec::new(),
        };
        (session, question)
    }

    /// The question the session is currently waiting on
    pub fn current_question(&self, session: &TriageSession) -> Option<Question> {
        match &session.state {
            TriageState::AwaitingFirstAnswer { start } => {
                Some(self.question_at(&session.language, start, &[]))
            }
            TriageState::AwaitingAnswer { current, selection } => Some(self.question_at(
                &session.language,
                current,
                selection.as_deref().unwrap_or_default(),
            )),
            TriageState::Completed(_) => None,
        }
    }

    /// Feed one answer into the session
    pub fn advance(&self, session: &mut TriageSession, input: &str) -> WalkerOutcome {
        let input = input.trim();
        let (current, selection) = match &session.state {
            TriageState::AwaitingFirstAnswer { start } => (start.clone(), None),
            TriageState::AwaitingAnswer { current, selection } => {
                (current.clone(), selection.clone())
            }
            TriageState::Completed(summary) => return WalkerOutcome::Completed(summary.clone()),
        };

        if self.graph.is_multichoice(current.as_str()) {
            self.advance_multichoice(session, current, selection.unwrap_or_default(), input)
        } else {
            self.advance_single(session, current, input)
        }
    }

    fn advance_single(
        &self,
        session: &mut TriageSession,
        current: NodeId,
        input: &str,
    ) -> WalkerOutcome {
        let matched = self
            .graph
            .outgoing_edges(current.as_str())
            .iter()
            .find(|edge| self.label(&session.language, &edge.answer) == input);

        match matched {
            Some(edge) => {
                debug!(
                    node = %current,
                    answer = input,
                    next = %edge.target,
                    "Triage answer accepted"
                );
                session.record(&current, input.to_string());
                self.enter(session, edge.target.clone())
            }
            None => {
                debug!(node = %current, input, "Triage input did not match any option");
                WalkerOutcome::Reprompt(self.question_at(&session.language, &current, &[]))
            }
        }
    }

    fn advance_multichoice(
        &self,
        session: &mut TriageSession,
        current: NodeId,
        mut selection: Vec<String>,
        input: &str,
    ) -> WalkerOutcome {
        let finish = self.label(&session.language, &self.settings.finish_answer_id);

        if input == finish {
            if selection.is_empty() {
                return WalkerOutcome::Reprompt(self.question_at(
                    &session.language,
                    &current,
                    &selection,
                ));
            }
            let Some(edge) = self.graph.outgoing_edges(current.as_str()).first() else {
                // Multichoice nodes are validated to have one edge at load time
                return WalkerOutcome::Reprompt(self.question_at(
                    &session.language,
                    &current,
                    &selection,
                ));
            };
            let answer = selection.join(SELECTION_SEPARATOR);
            debug!(
                node = %current,
                answer = %answer,
                next = %edge.target,
                "Multichoice selection finished"
            );
            session.record(&current, answer);
            return self.enter(session, edge.target.clone());
        }

        let is_choice = self
            .graph
            .choices(current.as_str())
            .iter()
            .any(|choice| self.label(&session.language, choice) == input);

        if !is_choice || selection.iter().any(|picked| picked == input) {
            debug!(node = %current, input, "Multichoice input rejected");
            return WalkerOutcome::Reprompt(self.question_at(
                &session.language,
                &current,
                &selection,
            ));
        }

        selection.push(input.to_string());
        let question = self.question_at(&session.language, &current, &selection);
        session.state = TriageState::AwaitingAnswer {
            current,
            selection: Some(selection),
        };
        WalkerOutcome::NextQuestion(question)
    }

    fn enter(&self, session: &mut TriageSession, node: NodeId) -> WalkerOutcome {
        if self.graph.next_prompt(node.as_str()).is_none() {
            let summary = self.summarize(session, node);
            debug!(terminal = %summary.terminal, category = ?summary.category, "Triage completed");
            session.state = TriageState::Completed(summary.clone());
            return WalkerOutcome::Completed(summary);
        }

        let question = self.question_at(&session.language, &node, &[]);
        let selection = self
            .graph
            .is_multichoice(node.as_str())
            .then(Vec::new);
        session.state = TriageState::AwaitingAnswer {
            current: node,
            selection,
        };
        WalkerOutcome::NextQuestion(question)
    }

    fn summarize(&self, session: &TriageSession, terminal: NodeId) -> TriageSummary {
        let answers: Vec<RecordedAnswer> = session
            .collected_answers
            .iter()
            .map(|(node, answer)| RecordedAnswer {
                node: node.clone(),
                prompt: self.prompt_label(&session.language, node),
                answer: answer.clone(),
            })
            .collect();

        let text = answers
            .iter()
            .map(|a| format!("{}: {}", a.prompt, a.answer))
            .collect::<Vec<_>>()
            .join("\n");

        let closing = self
            .graph
            .node(terminal.as_str())
            .and_then(|node| node.prompt.as_ref())
            .map(|prompt| self.label(&session.language, prompt));

        TriageSummary {
            text,
            answers,
            category: self.graph.category(terminal.as_str()),
            handoff: self.graph.handoff(terminal.as_str()),
            closing,
            terminal,
        }
    }

    fn question_at(&self, language: &str, node: &NodeId, selected: &[String]) -> Question {
        let prompt = self.prompt_label(language, node);
        let options = if self.graph.is_multichoice(node.as_str()) {
            self.graph
                .choices(node.as_str())
                .iter()
                .map(|choice| self.label(language, choice))
                .filter(|label| !selected.contains(label))
                .chain(std::iter::once(
                    self.label(language, &self.settings.finish_answer_id),
                ))
                .collect()
        } else {
            self.graph
                .outgoing_edges(node.as_str())
                .iter()
                .map(|edge| self.label(language, &edge.answer))
                .collect()
        };
        Question { prompt, options }
    }

    fn prompt_label(&self, language: &str, node: &NodeId) -> String {
        match self.graph.node(node.as_str()).and_then(|n| n.prompt.as_ref()) {
            Some(prompt) => self.label(language, prompt),
            None => node.to_string(),
        }
    }

    /// Session language, then the default language, then the raw id
    fn label(&self, language: &str, id: &str) -> String {
        self.catalog
            .resolve(language, id)
            .or_else(|| self.catalog.resolve(&self.settings.default_language, id))
            .unwrap_or(id)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn walker(graph: &str, catalog: StringCatalog) -> TriageWalker {
        TriageWalker::new(
            Arc::new(QuestionGraph::from_json_str(graph).unwrap()),
            Arc::new(catalog),
            TriageSettings::default(),
        )
        .unwrap()
    }

    const YES_NO: &str = r#"{
        "start": "a",
        "nodes": [
            {"id": "a", "prompt": "q_a"},
            {"id": "b", "prompt": "q_b"},
            {"id": "c", "category": "social"},
            {"id": "d", "prompt": "q_d", "category": "medical"}
        ],
        "edges": [
            {"from": "a", "to": "b", "answer": "a_yes"},
            {"from": "a", "to": "c", "answer": "a_no"},
            {"from": "b", "to": "d", "answer": "a_yes"},
            {"from": "b", "to": "c", "answer": "a_no"}
        ]
    }"#;

    const MULTI: &str = r#"{
        "start": "m",
        "nodes": [
            {"id": "m", "prompt": "q_m", "multichoice": true, "choices": ["a_x", "a_y"]},
            {"id": "end", "category": "medical"}
        ],
        "edges": [{"from": "m", "to": "end", "answer": "a_done"}]
    }"#;

    fn english() -> StringCatalog {
        StringCatalog::new().with_language(
            "en",
            [
                ("q_a", "Question A?"),
                ("q_b", "Question B?"),
                ("q_d", "Describe your symptoms"),
                ("q_m", "Pick some"),
                ("a_yes", "yes"),
                ("a_no", "no"),
                ("a_x", "x"),
                ("a_y", "y"),
                ("a_done", "Done"),
            ],
        )
    }

    fn options(q: &Question) -> Vec<&str> {
        q.options.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_yes_moves_to_next_prompt() {
        let walker = walker(YES_NO, english());
        let (mut session, first) = walker.start(None);
        assert_eq!(first.prompt, "Question A?");
        assert_eq!(options(&first), vec!["yes", "no"]);

        match walker.advance(&mut session, "yes") {
            WalkerOutcome::NextQuestion(q) => assert_eq!(q.prompt, "Question B?"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(session.current_node().map(NodeId::as_str), Some("b"));
        assert_eq!(session.answer("a"), Some("yes"));
    }

    #[test]
    fn test_unrecognized_input_reprompts_unchanged() {
        let walker = walker(YES_NO, english());
        let (mut session, first) = walker.start(None);
        let before = session.clone();

        let outcome = walker.advance(&mut session, "maybe");
        assert_eq!(outcome, WalkerOutcome::Reprompt(first));
        assert_eq!(session, before);
    }

    #[test]
    fn test_matching_is_exact_after_trim() {
        let walker = walker(YES_NO, english());
        let (mut session, _) = walker.start(None);
        assert!(matches!(
            walker.advance(&mut session, "Yes"),
            WalkerOutcome::Reprompt(_)
        ));
        assert!(matches!(
            walker.advance(&mut session, "  yes \n"),
            WalkerOutcome::NextQuestion(_)
        ));
    }

    #[test]
    fn test_completion_summary_in_visit_order() {
        let walker = walker(YES_NO, english());
        let (mut session, _) = walker.start(None);
        walker.advance(&mut session, "yes");
        let outcome = walker.advance(&mut session, "yes");

        let WalkerOutcome::Completed(summary) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(summary.text, "Question A?: yes\nQuestion B?: yes");
        assert_eq!(summary.terminal.as_str(), "d");
        assert_eq!(summary.category, Some(RequestCategory::Medical));
        assert_eq!(summary.closing.as_deref(), Some("Describe your symptoms"));
        assert!(session.is_completed());
        assert!(walker.current_question(&session).is_none());
    }

    #[test]
    fn test_multichoice_single_choice() {
        let walker = walker(MULTI, english());
        let (mut session, first) = walker.start(None);
        assert_eq!(options(&first), vec!["x", "y", "Done"]);

        let WalkerOutcome::NextQuestion(q) = walker.advance(&mut session, "x") else {
            panic!("expected next question");
        };
        assert_eq!(q.prompt, "Pick some");
        assert_eq!(options(&q), vec!["y", "Done"]);

        assert!(matches!(
            walker.advance(&mut session, "Done"),
            WalkerOutcome::Completed(_)
        ));
        assert_eq!(session.answer("m"), Some("x"));
    }

    #[test]
    fn test_multichoice_joins_selection() {
        let walker = walker(MULTI, english());
        let (mut session, _) = walker.start(None);
        walker.advance(&mut session, "x");
        walker.advance(&mut session, "y");
        let WalkerOutcome::Completed(summary) = walker.advance(&mut session, "Done") else {
            panic!("expected completion");
        };
        assert_eq!(session.answer("m"), Some("x, y"));
        assert_eq!(summary.text, "Pick some: x, y");
    }

    #[test]
    fn test_multichoice_rejects_repeat_and_empty_finish() {
        let walker = walker(MULTI, english());
        let (mut session, _) = walker.start(None);

        let WalkerOutcome::Reprompt(q) = walker.advance(&mut session, "Done") else {
            panic!("finishing with nothing selected should reprompt");
        };
        assert_eq!(options(&q), vec!["x", "y", "Done"]);

        walker.advance(&mut session, "x");
        let WalkerOutcome::Reprompt(q) = walker.advance(&mut session, "x") else {
            panic!("repeating a choice should reprompt");
        };
        assert_eq!(options(&q), vec!["y", "Done"]);

        assert!(matches!(
            walker.advance(&mut session, "z"),
            WalkerOutcome::Reprompt(_)
        ));
    }

    #[test]
    fn test_language_fallback() {
        let catalog = english().with_language("de", [("q_a", "Frage A?"), ("a_yes", "ja")]);
        let walker = walker(YES_NO, catalog);

        let (mut session, first) = walker.start(Some("de"));
        assert_eq!(first.prompt, "Frage A?");
        // "a_no" is missing in German and falls back to English
        assert_eq!(options(&first), vec!["ja", "no"]);
        assert!(matches!(
            walker.advance(&mut session, "ja"),
            WalkerOutcome::NextQuestion(_)
        ));

        let (session, _) = walker.start(Some("fr"));
        assert_eq!(session.language(), "en");
    }

    #[test]
    fn test_finish_collision_is_rejected() {
        let catalog = english().with_language("de", [("a_x", "Fertig"), ("a_done", "Fertig")]);
        let err = TriageWalker::new(
            Arc::new(QuestionGraph::from_json_str(MULTI).unwrap()),
            Arc::new(catalog),
            TriageSettings::default(),
        )
        .unwrap_err();
        match err {
            CoreError::FinishTokenCollision {
                language, label, ..
            } => {
                assert_eq!(language, "de");
                assert_eq!(label, "Fertig");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_string_is_rejected() {
        let catalog = StringCatalog::new().with_language("en", [("q_a", "A")]);
        let err = TriageWalker::new(
            Arc::new(QuestionGraph::from_json_str(YES_NO).unwrap()),
            Arc::new(catalog),
            TriageSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::MissingString { .. }));
    }
}
