mod api;
mod config;
mod conversation;
mod effects;
mod envelope;
mod format;
mod history;
mod state;
mod status;

use iced::{
    alignment, clipboard,
    event::{self, Event as IcedEvent},
    font,
    keyboard::{self, Key},
    time,
    widget::{
        button, column, container, horizontal_space, rich_text, row, scrollable, span, text,
        text::Span, text_input, text_input::Id,
    },
    window, Element, Font, Length, Padding, Subscription, Task, Theme,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::{HttpBackend, StudyBackend};
use config::{Config, HistoryConfig};
use conversation::{ChatMessage, EntryId};
use format::{Block, Inline};
use state::{AppState, Busy, Effect, Event};

const BOLD: Font = Font {
    weight: font::Weight::Bold,
    ..Font::MONOSPACE
};

fn render_response<'a>(message: &ChatMessage) -> Element<'a, Message> {
    let mut body = column![].spacing(8);

    for block in format::format_response(&message.response) {
        let spans: Vec<Span<'a, Message>> = match block {
            Block::ListItem { number, title, description } => {
                let mut spans = vec![span(format!("{}. ", number)), span(title).font(BOLD)];
                if !description.is_empty() {
                    spans.push(span(format!(": {}", description)));
                }
                spans
            }
            Block::Paragraph(inlines) => inlines
                .into_iter()
                .map(|inline| match inline {
                    Inline::Plain(s) => span(s),
                    Inline::Emphasis(s) => span(s).font(BOLD),
                })
                .collect(),
        };
        body = body.push(rich_text(spans).size(15));
    }

    for link in &message.links {
        let spans: Vec<Span<'a, Message>> = vec![
            span("-> "),
            span(link.title.clone())
                .font(BOLD)
                .link(Message::CopyLink(link.url.clone())),
            span(format!("  {}", link.url)),
        ];
        body = body.push(rich_text(spans).size(13));
    }

    body.into()
}

fn main() -> iced::Result {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("study_buddy=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    let size = iced::Size::new(config.window.width as f32, config.window.height as f32);
    let min_size = iced::Size::new(config.window.min_width as f32, config.window.min_height as f32);

    iced::application("Study Buddy", App::update, App::view)
        .theme(App::theme)
        .subscription(App::subscription)
        .window(window::Settings {
            size,
            min_size: Some(min_size),
            position: window::Position::Centered,
            ..Default::default()
        })
        .default_font(Font::MONOSPACE)
        .run_with(move || App::new(config))
}

#[derive(Debug, Clone)]
enum Message {
    InputChanged(String),
    Submit,
    PathChanged(String),
    Upload,
    State(Event),
    ToggleHistory,
    ReuseQuery(EntryId),
    CopyResponse,
    CopyLink(String),
    Escape,
}

struct App {
    state: AppState,
    backend: Arc<dyn StudyBackend>,
    input_text: String,
    upload_path: String,
    show_history: bool,
    history: HistoryConfig,
    input_id: Id,
    thread_id: scrollable::Id,
}

impl App {
    fn new(config: Config) -> (Self, Task<Message>) {
        let backend = HttpBackend::with_config(config.backend.base_url);
        tracing::info!(backend = backend.base_url(), "starting study buddy");

        let (state, effects) = AppState::new();
        let input_id = Id::unique();

        let app = App {
            state,
            backend: Arc::new(backend),
            input_text: String::new(),
            upload_path: String::new(),
            show_history: false,
            history: config.history,
            input_id: input_id.clone(),
            thread_id: scrollable::Id::unique(),
        };

        let focus_task = text_input::focus(input_id);
        let session_task = app.perform(effects);

        (app, Task::batch([focus_task, session_task]))
    }

    /// Spawns one task per effect; each resolves to its completion event.
    fn perform(&self, pending: Vec<Effect>) -> Task<Message> {
        Task::batch(pending.into_iter().map(|effect| {
            let backend = self.backend.clone();
            Task::future(effects::run(backend, effect)).map(Message::State)
        }))
    }

    fn dispatch(&mut self, event: Event) -> Task<Message> {
        let scroll_down = matches!(event, Event::QueryCompleted { .. });
        if matches!(event, Event::UploadCompleted { .. }) {
            self.upload_path.clear();
        }

        let effects = state::reduce(&mut self.state, event);
        let task = self.perform(effects);

        if scroll_down {
            Task::batch([
                task,
                scrollable::snap_to(self.thread_id.clone(), scrollable::RelativeOffset::END),
            ])
        } else {
            task
        }
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::InputChanged(value) => {
                self.input_text = value;
                Task::none()
            }
            Message::Submit => {
                let submit = Event::Submit(self.input_text.clone());
                let effects = state::reduce(&mut self.state, submit);
                if !effects.is_empty() {
                    self.input_text.clear();
                }
                self.perform(effects)
            }
            Message::PathChanged(value) => {
                self.upload_path = value;
                Task::none()
            }
            Message::Upload => {
                let path = self.upload_path.trim();
                if path.is_empty() {
                    return Task::none();
                }
                let path = PathBuf::from(path);
                self.dispatch(Event::SelectFile(path))
            }
            Message::State(event) => self.dispatch(event),
            Message::ToggleHistory => {
                self.show_history = !self.show_history;
                Task::none()
            }
            Message::ReuseQuery(id) => {
                if let Some(entry) = history::get_entry(self.state.conversation(), id) {
                    self.input_text = entry.prompt;
                }
                text_input::focus(self.input_id.clone())
            }
            Message::CopyResponse => match self.state.conversation().last() {
                Some(last) => {
                    let blocks = format::format_response(&last.response);
                    clipboard::write(format::to_plain_text(&blocks))
                }
                None => Task::none(),
            },
            Message::CopyLink(url) => clipboard::write(url),
            Message::Escape => {
                if self.state.alert().is_some() {
                    self.dispatch(Event::DismissAlert)
                } else {
                    Task::none()
                }
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        // The clock only exists while something is in flight, so nothing
        // ticks once the request has resolved.
        let timer = if self.state.busy().is_idle() {
            Subscription::none()
        } else {
            time::every(status::TICK).map(|instant: Instant| Message::State(Event::Tick(instant)))
        };

        let events = event::listen_with(|event, _status, _id| {
            if let IcedEvent::Keyboard(keyboard::Event::KeyPressed {
                key: Key::Named(keyboard::key::Named::Escape),
                ..
            }) = event
            {
                Some(Message::Escape)
            } else {
                None
            }
        });

        Subscription::batch([timer, events])
    }

    fn view(&self) -> Element<Message> {
        if let Some(alert) = self.state.alert() {
            return self.view_alert(alert);
        }

        let main = column![
            self.view_header(),
            self.view_uploads(),
            self.view_thread(),
            self.view_indicator(),
            self.view_inputs(),
        ]
        .spacing(10)
        .padding(10);

        let content: Element<Message> = if self.show_history {
            row![self.view_history(), main].spacing(10).into()
        } else {
            main.into()
        };

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_alert<'a>(&'a self, alert: &'a str) -> Element<'a, Message> {
        container(
            column![
                text(alert).size(16),
                button(text("OK").size(14))
                    .on_press(Message::State(Event::DismissAlert))
                    .padding(10),
            ]
            .spacing(20)
            .align_x(alignment::Horizontal::Center),
        )
        .width(Length::Fill)
        .height(Length::Fill)
        .padding(40)
        .align_x(alignment::Horizontal::Center)
        .align_y(alignment::Vertical::Center)
        .into()
    }

    fn view_header(&self) -> Element<Message> {
        let session_label = match self.state.session() {
            Some(_) => format!("connected, {} messages", self.state.conversation().len()),
            None => "no session".to_string(),
        };

        row![
            text("Study Buddy").size(20).font(BOLD),
            text(session_label).size(12),
            horizontal_space(),
            button(text("[History]").size(14))
                .on_press(Message::ToggleHistory)
                .padding(8),
            button(text("[New chat]").size(14))
                .on_press(Message::State(Event::NewChat))
                .padding(8),
        ]
        .spacing(12)
        .align_y(alignment::Vertical::Center)
        .into()
    }

    fn view_uploads(&self) -> Element<Message> {
        let mut notices = column![].spacing(4);
        for upload in self.state.uploads() {
            notices = notices.push(
                row![
                    text(format!(
                        "{}: {} ({} pages, {} chunks) at {}",
                        upload.filename,
                        upload.message,
                        upload.pages_extracted,
                        upload.chunks_created,
                        upload.created_at.format("%H:%M"),
                    ))
                    .size(13),
                    horizontal_space(),
                    button(text("x").size(12))
                        .on_press(Message::State(Event::DismissUpload(upload.id)))
                        .padding(4),
                ]
                .align_y(alignment::Vertical::Center),
            );
        }
        notices.into()
    }

    fn view_thread(&self) -> Element<Message> {
        let conversation = self.state.conversation();

        let body: Element<Message> = if conversation.is_empty() {
            container(text("Upload a PDF or ask a question to get started.").size(15))
                .width(Length::Fill)
                .padding(15)
                .into()
        } else {
            let mut thread = column![].spacing(18).padding(15).width(Length::Fill);
            for message in conversation.messages() {
                thread = thread.push(
                    column![
                        text(format!(
                            "You ({}): {}",
                            message.created_at.format("%H:%M"),
                            message.query
                        ))
                        .size(15)
                        .font(BOLD),
                        render_response(message),
                    ]
                    .spacing(8),
                );
            }
            thread.into()
        };

        scrollable(body)
            .id(self.thread_id.clone())
            .height(Length::Fill)
            .into()
    }

    fn view_indicator(&self) -> Element<Message> {
        let spinner = status::spinner_frame(self.state.spinner_frame());
        let line = match self.state.busy() {
            Busy::Idle => None,
            Busy::Submitting { .. } => self.state.status_line().map(str::to_string),
            Busy::Uploading { filename } => Some(format!("Uploading {}...", filename)),
        };

        match line {
            Some(line) => row![text(spinner).size(18), text(line).size(15)]
                .spacing(10)
                .align_y(alignment::Vertical::Center)
                .into(),
            None if !self.state.conversation().is_empty() => container(
                button(text("[Copy]").size(14))
                    .on_press(Message::CopyResponse)
                    .padding(6),
            )
            .width(Length::Fill)
            .align_x(alignment::Horizontal::Right)
            .padding(Padding::from([0, 10]))
            .into(),
            None => row![].into(),
        }
    }

    fn view_inputs(&self) -> Element<Message> {
        let idle = self.state.busy().is_idle();

        let query = text_input("Ask about your notes...", &self.input_text)
            .on_input(Message::InputChanged)
            .on_submit(Message::Submit)
            .padding(12)
            .size(16)
            .id(self.input_id.clone());

        let path = text_input("Path to a PDF file", &self.upload_path)
            .on_input(Message::PathChanged)
            .on_submit(Message::Upload)
            .padding(10)
            .size(14);

        column![
            row![
                query,
                button(text("Ask").size(16))
                    .on_press_maybe(idle.then_some(Message::Submit))
                    .padding(12),
            ]
            .spacing(8),
            row![
                path,
                button(text("Upload PDF").size(14))
                    .on_press_maybe(idle.then_some(Message::Upload))
                    .padding(10),
            ]
            .spacing(8),
        ]
        .spacing(8)
        .into()
    }

    fn view_history(&self) -> Element<Message> {
        let entries = history::list_entries(
            self.state.conversation(),
            self.history.limit,
            self.history.preview_width,
        );

        let mut list = column![text("History").size(16).font(BOLD)].spacing(6).padding(10);
        if entries.is_empty() {
            list = list.push(text("Nothing asked yet.").size(13));
        }
        for entry in entries {
            list = list.push(
                button(text(format!("{} {}", entry.time_label, entry.preview)).size(13))
                    .on_press(Message::ReuseQuery(entry.id))
                    .width(Length::Fill)
                    .padding(6),
            );
        }

        container(scrollable(list))
            .width(Length::Fixed(260.0))
            .height(Length::Fill)
            .into()
    }

    fn theme(&self) -> Theme {
        Theme::TokyoNight
    }
}
