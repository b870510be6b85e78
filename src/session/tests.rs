use super::*;
use crate::embeddings::ChunkingConfig;
use std::cell::{Cell, RefCell};

/// Embeds text as letter frequencies so that similar words land close together
struct LetterEmbedder {
    batch_size: usize,
    failing_batches: Vec<usize>,
    fail_everything: bool,
    fail_queries: bool,
    document_calls: Cell<usize>,
    query_types: RefCell<Vec<InputType>>,
}

impl LetterEmbedder {
    fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            failing_batches: Vec::new(),
            fail_everything: false,
            fail_queries: false,
            document_calls: Cell::new(0),
            query_types: RefCell::new(Vec::new()),
        }
    }
}

fn letter_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; 26];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    vector
}

impl Embedder for LetterEmbedder {
    fn embed_batch(&self, texts: &[String], input_type: InputType) -> anyhow::Result<Vec<Vec<f32>>> {
        self.query_types.borrow_mut().push(input_type);
        if self.fail_everything {
            anyhow::bail!("service unavailable");
        }
        if self.fail_queries && input_type == InputType::SearchQuery {
            anyhow::bail!("query rejected");
        }
        if input_type == InputType::SearchDocument {
            let call = self.document_calls.get();
            self.document_calls.set(call + 1);
            if self.failing_batches.contains(&call) {
                anyhow::bail!("batch {} rejected", call);
            }
        }
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RecordedRequest {
    message: String,
    documents: Vec<String>,
    history: Vec<DialogueTurn>,
}

#[derive(Default)]
struct RecordingChat {
    requests: RefCell<Vec<RecordedRequest>>,
    fail: bool,
}

impl ChatModel for RecordingChat {
    fn chat(&self, request: &ChatRequest<'_>) -> anyhow::Result<String> {
        if self.fail {
            anyhow::bail!("generation failed");
        }
        let mut requests = self.requests.borrow_mut();
        requests.push(RecordedRequest {
            message: request.message.to_string(),
            documents: request.documents.to_vec(),
            history: request.history.to_vec(),
        });
        Ok(format!("answer {}", requests.len()))
    }
}

fn small_chunker() -> Chunker {
    Chunker::new(ChunkingConfig {
        chunk_size: 10,
        overlap: 2,
    })
    .expect("valid chunking config")
}

fn session<'a>(
    embedder: &'a LetterEmbedder,
    chat: &'a RecordingChat,
) -> Session<&'a LetterEmbedder, &'a RecordingChat> {
    Session::new(embedder, chat, small_chunker(), RetrievalConfig::default())
}

const DOCS: [&str; 5] = ["aaaaaaaa", "bbbbbbbb", "cccccccc", "dddddddd", "eeeeeeee"];

#[test]
fn ask_before_process_returns_not_ready() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    assert_eq!(session.state(), SessionState::Uninitialized);
    let answer = session.ask("anything?").expect("ask never fails when not ready");

    assert_eq!(answer, NOT_READY_ANSWER);
    assert_eq!(session.history().len(), 0);
    assert!(chat.requests.borrow().is_empty());
    assert!(embedder.query_types.borrow().is_empty());
}

#[test]
fn process_fifteen_hundred_characters_yields_two_segments() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = Session::new(
        &embedder,
        &chat,
        Chunker::new(ChunkingConfig::default()).expect("valid config"),
        RetrievalConfig::default(),
    );

    let document = "abcdefghij".repeat(150);
    let report = session.process(&[document]).expect("process succeeds");

    assert_eq!(report.segments, 2);
    assert_eq!(report.embedded, 2);
    assert_eq!(report.dimension, 26);
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn process_embeds_segments_as_documents() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    session.process(&DOCS).expect("process succeeds");
    assert!(
        embedder
            .query_types
            .borrow()
            .iter()
            .all(|t| *t == InputType::SearchDocument)
    );
}

#[test]
fn ask_sends_top_three_documents_closest_first() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);
    session.process(&DOCS).expect("process succeeds");

    let answer = session.ask("ccc").expect("ask succeeds");
    assert_eq!(answer, "answer 1");

    let requests = chat.requests.borrow();
    assert_eq!(requests[0].message, "ccc");
    assert_eq!(requests[0].documents.len(), 3);
    assert_eq!(requests[0].documents[0], "cccccccc");
    assert!(requests[0].history.is_empty());
    assert_eq!(
        embedder.query_types.borrow().last(),
        Some(&InputType::SearchQuery)
    );
}

#[test]
fn two_asks_grow_history_by_four_turns() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);
    session.process(&DOCS).expect("process succeeds");

    session.ask("first question").expect("ask succeeds");
    session.ask("second question").expect("ask succeeds");

    let roles: Vec<Role> = session.history().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Chatbot, Role::User, Role::Chatbot]
    );
    assert_eq!(session.history()[0].message, "first question");
    assert_eq!(session.history()[1].message, "answer 1");
    assert_eq!(session.history()[3].message, "answer 2");

    let requests = chat.requests.borrow();
    assert_eq!(
        requests[1].history,
        vec![
            DialogueTurn::user("first question"),
            DialogueTurn::chatbot("answer 1")
        ]
    );
}

#[test]
fn transcript_uses_display_roles() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);
    session.process(&DOCS).expect("process succeeds");
    session.ask("hello").expect("ask succeeds");

    let transcript: Vec<(&str, &str)> = session.transcript().collect();
    assert_eq!(
        transcript,
        vec![("user", "hello"), ("assistant", "answer 1")]
    );
}

#[test]
fn history_window_limits_replayed_turns() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = Session::new(
        &embedder,
        &chat,
        small_chunker(),
        RetrievalConfig {
            top_k: 3,
            history_window: Some(2),
        },
    );
    session.process(&DOCS).expect("process succeeds");

    for question in ["one", "two", "three"] {
        session.ask(question).expect("ask succeeds");
    }

    let requests = chat.requests.borrow();
    assert_eq!(requests[2].history.len(), 2);
    assert_eq!(requests[2].history[0], DialogueTurn::user("two"));
    assert_eq!(session.history().len(), 6);
}

#[test]
fn odd_history_window_never_starts_with_an_answer() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = Session::new(
        &embedder,
        &chat,
        small_chunker(),
        RetrievalConfig {
            top_k: 3,
            history_window: Some(3),
        },
    );
    session.process(&DOCS).expect("process succeeds");

    for question in ["one", "two", "three"] {
        session.ask(question).expect("ask succeeds");
    }

    let requests = chat.requests.borrow();
    assert_eq!(
        requests[2].history,
        vec![DialogueTurn::user("two"), DialogueTurn::chatbot("answer 2")]
    );
    assert_eq!(session.replayed_history()[0].role, Role::User);
}

#[test]
fn partial_batch_failure_keeps_store_aligned() {
    let mut embedder = LetterEmbedder::new(2);
    embedder.failing_batches = vec![1];
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    let report = session.process(&DOCS).expect("process succeeds");
    assert_eq!(report.segments, 5);
    assert_eq!(report.embedded, 3);
    assert_eq!(report.skipped(), 2);

    let store = session.vectorstore().expect("store installed");
    assert_eq!(store.len(), 3);
    assert_eq!(
        store.documents().iter().collect::<Vec<_>>(),
        vec!["aaaaaaaa", "bbbbbbbb", "eeeeeeee"]
    );

    // Each surviving vector still resolves to the text it was computed from
    for text in store.documents().iter() {
        let hit = store
            .retrieve(&letter_vector(text), 1)
            .expect("retrieve succeeds");
        assert_eq!(hit, vec![text.to_string()]);
    }
}

#[test]
fn all_batches_failing_leaves_session_uninitialized() {
    let mut embedder = LetterEmbedder::new(90);
    embedder.fail_everything = true;
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    let result = session.process(&DOCS);
    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert_eq!(
        session.ask("still there?").expect("not ready answer"),
        NOT_READY_ANSWER
    );
}

#[test]
fn failed_reprocess_keeps_previous_store() {
    let mut embedder = LetterEmbedder::new(90);
    embedder.failing_batches = vec![1];
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    session.process(&DOCS).expect("first process succeeds");
    let result = session.process(&["zzzzzz"]);

    assert!(result.is_err());
    let store = session.vectorstore().expect("previous store kept");
    assert_eq!(store.len(), 5);
}

#[test]
fn empty_documents_are_rejected() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    let result = session.process(&["", ""]);
    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(!session.is_ready());
}

#[test]
fn reprocessing_same_documents_is_idempotent() {
    let embedder = LetterEmbedder::new(3);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    session.process(&DOCS).expect("process succeeds");
    let first = session.vectorstore().cloned().expect("store installed");
    session.process(&DOCS).expect("process succeeds");
    let second = session.vectorstore().cloned().expect("store installed");

    assert_eq!(first.len(), second.len());
    let query = letter_vector("dd");
    assert_eq!(
        first.retrieve(&query, 3).expect("retrieve"),
        second.retrieve(&query, 3).expect("retrieve")
    );
}

#[test]
fn reprocess_replaces_store_and_keeps_history() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);

    session.process(&DOCS).expect("process succeeds");
    session.ask("aaa").expect("ask succeeds");
    session.process(&["xyxyxyxy"]).expect("reprocess succeeds");

    assert_eq!(session.vectorstore().map(Vectorstore::len), Some(1));
    assert_eq!(session.history().len(), 2);
}

#[test]
fn generation_failure_leaves_history_untouched() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat {
        fail: true,
        ..RecordingChat::default()
    };
    let mut session = session(&embedder, &chat);
    session.process(&DOCS).expect("process succeeds");

    let result = session.ask("question");
    assert!(matches!(result, Err(RagError::Generation(_))));
    assert!(session.history().is_empty());
}

#[test]
fn query_embedding_failure_is_reported() {
    let mut embedder = LetterEmbedder::new(90);
    embedder.fail_queries = true;
    let chat = RecordingChat::default();
    let mut session = session(&embedder, &chat);
    session.process(&DOCS).expect("process succeeds");

    let result = session.ask("question");
    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(session.history().is_empty());
    assert!(chat.requests.borrow().is_empty());
}

#[test]
fn from_config_rejects_invalid_chunking() {
    let embedder = LetterEmbedder::new(90);
    let chat = RecordingChat::default();
    let mut config = Config::default();
    config.chunking.overlap = config.chunking.chunk_size;

    let result = Session::from_config(&embedder, &chat, &config);
    assert!(matches!(result, Err(ConfigError::OverlapTooLarge { .. })));
}

#[test]
fn role_wire_names() {
    let turn = DialogueTurn::chatbot("hi");
    let json = serde_json::to_value(&turn).expect("serializes");
    assert_eq!(json["role"], "CHATBOT");
    assert_eq!(json["message"], "hi");
    assert_eq!(Role::User.as_str(), "USER");
}
