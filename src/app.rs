use std::sync::Arc;

use ratatui::layout::Rect;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;

use crate::assist::{
    Backend, ConsultEvent, DocumentRecognizer, MockAssist, QuestionAnswerer, RecognizedDocument,
    RemoteAssist, ScanEvent,
};
use crate::assist::remote::DEFAULT_ENDPOINT;
use crate::claim::ClaimCase;
use crate::tui::AppEvent;

/// Identifier handed to the recognizer for the bundled demo asset.
pub const SAMPLE_DOCUMENT: &str = "claim-documents/site-invoice.jpg";

/// Standing greeting shown at the top of the consultation pane. Not part
/// of the session history.
pub const WELCOME: &str = "Hello, I am your dedicated insurance advisor. Ask me anything \
                           about public or employer liability claims.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Progress,
    Consult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Lifecycle of the document-upload overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Scanning,
    Result,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    pub case: ClaimCase,

    // Consultation state
    pub chat_messages: Vec<ChatMessage>,
    pub consult_input: String,
    pub consult_cursor: usize, // cursor position in consult_input
    pub thinking: bool,
    pub matched_sources: Vec<String>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    consult_cycle: u64,
    answer_task: Option<JoinHandle<()>>,

    // Upload overlay state
    pub show_upload: bool,
    pub upload_state: UploadState,
    pub recognized: Option<RecognizedDocument>,
    pub scan_error: Option<String>,
    scan_cycle: u64,
    scan_task: Option<JoinHandle<()>>,

    // Animation state
    pub animation_frame: u8,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Collaborators
    pub backend: Backend,
    answerer: Arc<dyn QuestionAnswerer>,
    recognizer: Arc<dyn DocumentRecognizer>,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(events: UnboundedSender<AppEvent>, backend: Backend, endpoint: Option<&str>) -> Self {
        let (answerer, recognizer): (Arc<dyn QuestionAnswerer>, Arc<dyn DocumentRecognizer>) =
            match backend {
                Backend::Mock => {
                    let assist = Arc::new(MockAssist::new());
                    (assist.clone(), assist)
                }
                Backend::Remote => {
                    let assist = Arc::new(RemoteAssist::new(endpoint.unwrap_or(DEFAULT_ENDPOINT)));
                    (assist.clone(), assist)
                }
            };

        Self {
            should_quit: false,
            screen: Screen::Progress,
            input_mode: InputMode::Normal,

            case: ClaimCase::demo(),

            chat_messages: Vec::new(),
            consult_input: String::new(),
            consult_cursor: 0,
            thinking: false,
            matched_sources: Vec::new(),
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            consult_cycle: 0,
            answer_task: None,

            show_upload: false,
            upload_state: UploadState::Idle,
            recognized: None,
            scan_error: None,
            scan_cycle: 0,
            scan_task: None,

            animation_frame: 0,

            chat_area: None,

            backend,
            answerer,
            recognizer,
            events,
        }
    }

    /// Start one consultation cycle. Appends the user message synchronously,
    /// then hands the question to the answerer on a fresh cycle. Returns
    /// false when the send is refused (blank input, or still thinking).
    pub fn send_message(&mut self) -> bool {
        let question = self.consult_input.trim().to_string();
        if question.is_empty() || self.thinking {
            return false;
        }

        self.chat_messages.push(ChatMessage {
            role: ChatRole::User,
            content: question.clone(),
            citations: Vec::new(),
        });
        self.consult_input.clear();
        self.consult_cursor = 0;
        self.thinking = true;
        self.matched_sources.clear();

        // Invalidate the previous cycle before any of its timers land.
        self.consult_cycle += 1;
        if let Some(task) = self.answer_task.take() {
            task.abort();
        }

        let cycle = self.consult_cycle;
        let answerer = self.answerer.clone();
        let history = self.chat_messages.clone();
        let events = self.events.clone();
        self.answer_task = Some(tokio::spawn(async move {
            let (source_tx, mut source_rx) = mpsc::unbounded_channel();

            let forward = {
                let events = events.clone();
                tokio::spawn(async move {
                    while let Some(section) = source_rx.recv().await {
                        let _ = events.send(AppEvent::Consult {
                            cycle,
                            event: ConsultEvent::SourceMatched(section),
                        });
                    }
                })
            };

            let outcome = answerer.answer(&question, &history, source_tx).await;
            let _ = forward.await;

            let event = match outcome {
                Ok(answer) => ConsultEvent::Answered(answer),
                Err(err) => ConsultEvent::Failed(err.to_string()),
            };
            let _ = events.send(AppEvent::Consult { cycle, event });
        }));

        self.scroll_chat_to_bottom();
        true
    }

    pub fn apply_consult_event(&mut self, cycle: u64, event: ConsultEvent) {
        // Events from a superseded send must not touch the current cycle.
        if cycle != self.consult_cycle {
            return;
        }

        match event {
            ConsultEvent::SourceMatched(section) => {
                self.matched_sources.push(section);
            }
            ConsultEvent::Answered(answer) => {
                self.thinking = false;
                self.answer_task = None;
                self.chat_messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: answer.text,
                    citations: answer.citations,
                });
            }
            ConsultEvent::Failed(message) => {
                self.thinking = false;
                self.answer_task = None;
                self.chat_messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: format!("Error: {}. Check the assist backend and try again.", message),
                    citations: Vec::new(),
                });
            }
        }
        self.scroll_chat_to_bottom();
    }

    pub fn open_upload(&mut self) {
        self.show_upload = true;
        self.upload_state = UploadState::Idle;
        self.recognized = None;
        self.scan_error = None;
    }

    /// Dismiss the overlay from any state. An in-flight scan is invalidated
    /// so it cannot fire into a later cycle.
    pub fn close_upload(&mut self) {
        self.scan_cycle += 1;
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
        self.show_upload = false;
        self.upload_state = UploadState::Idle;
        self.recognized = None;
        self.scan_error = None;
    }

    pub fn begin_scan(&mut self) {
        if self.upload_state != UploadState::Idle {
            return;
        }
        self.upload_state = UploadState::Scanning;
        self.scan_error = None;

        self.scan_cycle += 1;
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }

        let cycle = self.scan_cycle;
        let recognizer = self.recognizer.clone();
        let events = self.events.clone();
        self.scan_task = Some(tokio::spawn(async move {
            let event = match recognizer.recognize(SAMPLE_DOCUMENT).await {
                Ok(doc) => ScanEvent::Recognized(doc),
                Err(err) => ScanEvent::Failed(err.to_string()),
            };
            let _ = events.send(AppEvent::Scan { cycle, event });
        }));
    }

    pub fn apply_scan_event(&mut self, cycle: u64, event: ScanEvent) {
        if cycle != self.scan_cycle || !self.show_upload || self.upload_state != UploadState::Scanning
        {
            return;
        }

        self.scan_task = None;
        match event {
            ScanEvent::Recognized(doc) => {
                self.upload_state = UploadState::Result;
                self.recognized = Some(doc);
            }
            ScanEvent::Failed(message) => {
                self.upload_state = UploadState::Idle;
                self.scan_error = Some(message);
            }
        }
    }

    /// Confirm on the result sheet. Submission itself belongs to the claims
    /// backend, so the overlay simply closes.
    pub fn confirm_upload(&mut self) {
        if self.upload_state == UploadState::Result {
            self.close_upload();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.thinking || self.upload_state == UploadState::Scanning {
            self.animation_frame = self.animation_frame.wrapping_add(1);
        }
    }

    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_chat_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Scroll the chat so the newest message (or the thinking indicator)
    /// is visible.
    pub fn scroll_chat_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let wrapped = |text: &str| -> u16 {
            let mut lines: u16 = 0;
            for line in text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    lines += 1;
                } else {
                    lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            lines
        };

        // Greeting block at the top of the pane
        let mut total_lines: u16 = 1 + wrapped(WELCOME) + 1;

        for msg in &self.chat_messages {
            total_lines += 1; // Role line ("You:" or "AI:")
            total_lines += wrapped(&msg.content);
            if !msg.citations.is_empty() {
                total_lines += 1 + msg.citations.len() as u16;
            }
            total_lines += 1; // Blank line after message
        }

        if self.thinking {
            total_lines += 2 + self.matched_sources.len() as u16;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assist::Answer;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn mock_app() -> (App, UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(tx, Backend::Mock, None), rx)
    }

    #[tokio::test]
    async fn blank_input_never_sends() {
        let (mut app, _rx) = mock_app();

        app.consult_input = "   ".to_string();
        assert!(!app.send_message());

        assert!(app.chat_messages.is_empty());
        assert!(!app.thinking);
        assert!(app.answer_task.is_none());
    }

    #[tokio::test]
    async fn send_appends_the_user_message_synchronously() {
        let (mut app, _rx) = mock_app();

        app.consult_input = "  test  ".to_string();
        assert!(app.send_message());

        assert_eq!(app.chat_messages.len(), 1);
        assert_eq!(app.chat_messages[0].role, ChatRole::User);
        assert_eq!(app.chat_messages[0].content, "test");
        assert!(app.consult_input.is_empty());
        assert!(app.thinking);
    }

    #[tokio::test]
    async fn send_is_refused_while_thinking() {
        let (mut app, _rx) = mock_app();

        app.consult_input = "first".to_string();
        assert!(app.send_message());

        app.consult_input = "second".to_string();
        assert!(!app.send_message());
        assert_eq!(app.chat_messages.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn consult_round_trip_appends_exactly_one_answer() {
        let (mut app, mut rx) = mock_app();

        app.consult_input =
            "The elevator broke down and trapped a resident, is that covered?".to_string();
        app.send_message();
        assert_eq!(app.chat_messages.len(), 1);

        let start = tokio::time::Instant::now();
        while app.thinking {
            match rx.recv().await.unwrap() {
                AppEvent::Consult { cycle, event } => app.apply_consult_event(cycle, event),
                _ => {}
            }
        }

        assert_eq!(start.elapsed(), Duration::from_millis(3500));
        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::Assistant);
        assert_eq!(app.chat_messages[1].citations.len(), 2);
        assert_eq!(app.matched_sources.len(), 2);
    }

    #[tokio::test]
    async fn stale_consult_events_are_dropped() {
        let (mut app, _rx) = mock_app();

        app.consult_input = "first".to_string();
        app.send_message();
        let old_cycle = app.consult_cycle;

        // A newer send supersedes the first cycle.
        app.consult_cycle += 1;

        app.apply_consult_event(
            old_cycle,
            ConsultEvent::Answered(Answer {
                text: "stale".to_string(),
                citations: Vec::new(),
            }),
        );

        assert_eq!(app.chat_messages.len(), 1);
        assert!(app.thinking);
    }

    #[tokio::test]
    async fn failed_answer_surfaces_in_chat() {
        let (mut app, _rx) = mock_app();

        app.consult_input = "test".to_string();
        app.send_message();
        app.apply_consult_event(app.consult_cycle, ConsultEvent::Failed("boom".to_string()));

        assert!(!app.thinking);
        assert_eq!(app.chat_messages.len(), 2);
        assert_eq!(app.chat_messages[1].role, ChatRole::Assistant);
        assert!(app.chat_messages[1].content.starts_with("Error: boom"));
        assert!(app.chat_messages[1].citations.is_empty());
    }

    #[tokio::test]
    async fn scan_passes_through_scanning_before_result() {
        let (mut app, _rx) = mock_app();

        app.open_upload();
        assert_eq!(app.upload_state, UploadState::Idle);

        app.begin_scan();
        assert_eq!(app.upload_state, UploadState::Scanning);

        app.apply_scan_event(
            app.scan_cycle,
            ScanEvent::Recognized(RecognizedDocument {
                document_type: "Medical invoice".to_string(),
                amount: 800.0,
                date: "2024-05-20".to_string(),
            }),
        );
        assert_eq!(app.upload_state, UploadState::Result);
        assert!(app.recognized.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_result_arrives_after_the_fixed_delay() {
        let (mut app, mut rx) = mock_app();

        app.open_upload();
        app.begin_scan();

        let start = tokio::time::Instant::now();
        match rx.recv().await.unwrap() {
            AppEvent::Scan { cycle, event } => app.apply_scan_event(cycle, event),
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert_eq!(app.upload_state, UploadState::Result);
    }

    #[tokio::test]
    async fn closing_the_overlay_resets_everything() {
        let (mut app, _rx) = mock_app();

        app.open_upload();
        app.begin_scan();
        let cycle = app.scan_cycle;
        app.close_upload();

        assert!(!app.show_upload);
        assert_eq!(app.upload_state, UploadState::Idle);
        assert!(app.recognized.is_none());

        // The in-flight scan must not resurrect the dismissed overlay.
        app.apply_scan_event(
            cycle,
            ScanEvent::Recognized(RecognizedDocument {
                document_type: "Medical invoice".to_string(),
                amount: 800.0,
                date: "2024-05-20".to_string(),
            }),
        );
        assert!(!app.show_upload);
        assert_eq!(app.upload_state, UploadState::Idle);
    }

    #[tokio::test]
    async fn scan_failure_returns_to_idle_with_a_note() {
        let (mut app, _rx) = mock_app();

        app.open_upload();
        app.begin_scan();
        app.apply_scan_event(app.scan_cycle, ScanEvent::Failed("connection refused".to_string()));

        assert_eq!(app.upload_state, UploadState::Idle);
        assert_eq!(app.scan_error.as_deref(), Some("connection refused"));
        assert!(app.show_upload);
    }

    #[tokio::test]
    async fn confirm_only_acts_on_the_result_sheet() {
        let (mut app, _rx) = mock_app();

        app.open_upload();
        app.confirm_upload();
        assert!(app.show_upload);

        app.begin_scan();
        app.apply_scan_event(
            app.scan_cycle,
            ScanEvent::Recognized(RecognizedDocument {
                document_type: "Medical invoice".to_string(),
                amount: 800.0,
                date: "2024-05-20".to_string(),
            }),
        );
        app.confirm_upload();
        assert!(!app.show_upload);
        assert_eq!(app.upload_state, UploadState::Idle);
    }
}
