use crate::grafana::GrafanaDashboards;
use crate::input::Action;
use crate::manifest::{self, TEMPLATE};
use crate::merge::{merge, merge_list};
use crate::model::{Component, InferenceService, PodLogs};
use crate::owned::OwnedResources;
use crate::poller::{PollTicket, Poller, PollerConfig};
use chrono::{DateTime, Local};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum InputMode {
    Normal,
    Command,
    Filter,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Screen {
    List,
    Detail,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DetailTab {
    Overview,
    Predictor,
    Transformer,
    Explainer,
    Logs,
    Yaml,
}

impl DetailTab {
    pub const ALL: [Self; 6] = [
        Self::Overview,
        Self::Predictor,
        Self::Transformer,
        Self::Explainer,
        Self::Logs,
        Self::Yaml,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Predictor => "Predictor",
            Self::Transformer => "Transformer",
            Self::Explainer => "Explainer",
            Self::Logs => "Logs",
            Self::Yaml => "YAML",
        }
    }

    pub fn component(self) -> Option<Component> {
        match self {
            Self::Predictor => Some(Component::Predictor),
            Self::Transformer => Some(Component::Transformer),
            Self::Explainer => Some(Component::Explainer),
            Self::Overview | Self::Logs | Self::Yaml => None,
        }
    }

    fn offset(self, delta: isize) -> Self {
        let index = Self::ALL
            .iter()
            .position(|tab| *tab == self)
            .unwrap_or_default() as isize;
        let len = Self::ALL.len() as isize;
        Self::ALL[(index + delta).rem_euclid(len) as usize]
    }
}

/// Matches an owned-resource resolution to the detail view that asked for it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OwnedTicket {
    view: u64,
    sequence: u64,
}

/// Background work the event loop should spawn.
#[derive(Debug)]
pub enum FetchRequest {
    List {
        ticket: PollTicket,
        namespace: String,
    },
    Detail {
        ticket: PollTicket,
        namespace: String,
        name: String,
    },
    Logs {
        ticket: PollTicket,
        namespace: String,
        name: String,
        component: Component,
    },
    Owned {
        ticket: OwnedTicket,
        isvc: Box<InferenceService>,
    },
    Grafana {
        prefix: String,
    },
}

/// Results of spawned work; errors arrive already compacted.
#[derive(Debug)]
pub enum FetchEvent {
    List {
        ticket: PollTicket,
        result: Result<Vec<InferenceService>, String>,
    },
    Detail {
        ticket: PollTicket,
        result: Result<InferenceService, String>,
    },
    Logs {
        ticket: PollTicket,
        component: Component,
        result: Result<PodLogs, String>,
    },
    Owned {
        ticket: OwnedTicket,
        resources: OwnedResources,
    },
    Grafana(Option<GrafanaDashboards>),
    Created {
        namespace: String,
        result: Result<InferenceService, String>,
    },
    Deleted {
        namespace: String,
        name: String,
        result: Result<(), String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    None,
    Create {
        namespace: String,
        isvc: Box<InferenceService>,
    },
    Delete {
        namespace: String,
        name: String,
    },
}

#[derive(Debug, Clone)]
struct PendingConfirmation {
    prompt: String,
    command: AppCommand,
}

#[derive(Debug, Clone)]
pub struct DetailView {
    namespace: String,
    name: String,
    isvc: Option<InferenceService>,
    owned: Option<OwnedResources>,
    tab: DetailTab,
    logs_component: Component,
    logs: Option<PodLogs>,
    logs_error: Option<String>,
    error: Option<String>,
    last_refresh: Option<DateTime<Local>>,
}

impl DetailView {
    fn new(namespace: String, name: String, isvc: Option<InferenceService>) -> Self {
        Self {
            namespace,
            name,
            isvc,
            owned: None,
            tab: DetailTab::Overview,
            logs_component: Component::Predictor,
            logs: None,
            logs_error: None,
            error: None,
            last_refresh: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn isvc(&self) -> Option<&InferenceService> {
        self.isvc.as_ref()
    }

    pub fn owned(&self) -> Option<&OwnedResources> {
        self.owned.as_ref()
    }

    pub fn tab(&self) -> DetailTab {
        self.tab
    }

    pub fn logs_component(&self) -> Component {
        self.logs_component
    }

    pub fn logs(&self) -> Option<&PodLogs> {
        self.logs.as_ref()
    }

    pub fn logs_error(&self) -> Option<&str> {
        self.logs_error.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn last_refresh(&self) -> Option<String> {
        self.last_refresh
            .map(|stamp| stamp.format("%H:%M:%S").to_string())
    }
}

pub struct App {
    running: bool,
    mode: InputMode,
    input: String,
    status: String,
    show_help: bool,
    pending_g: bool,
    backend_label: String,
    namespace: String,
    screen: Screen,
    filter: String,
    services: Vec<InferenceService>,
    selected: usize,
    list_error: Option<String>,
    list_refreshed: Option<DateTime<Local>>,
    list_poller: Poller,
    detail: Option<DetailView>,
    detail_poller: Poller,
    logs_poller: Poller,
    view_generation: u64,
    owned_sequence: u64,
    grafana: Option<GrafanaDashboards>,
    queued: Vec<FetchRequest>,
    overlay: Option<(String, String)>,
    scroll: u16,
    pending_confirmation: Option<PendingConfirmation>,
}

impl App {
    pub fn new(
        backend_label: String,
        namespace: String,
        view_poller: PollerConfig,
        logs_poller: PollerConfig,
        grafana_prefix: Option<String>,
    ) -> Self {
        let mut list_poller = Poller::new(view_poller);
        list_poller.start(Instant::now());

        let queued = grafana_prefix
            .map(|prefix| vec![FetchRequest::Grafana { prefix }])
            .unwrap_or_default();

        Self {
            running: true,
            mode: InputMode::Normal,
            input: String::new(),
            status: "Loading InferenceServices…".to_string(),
            show_help: false,
            pending_g: false,
            backend_label,
            namespace,
            screen: Screen::List,
            filter: String::new(),
            services: Vec::new(),
            selected: 0,
            list_error: None,
            list_refreshed: None,
            list_poller,
            detail: None,
            detail_poller: Poller::new(view_poller),
            logs_poller: Poller::new(logs_poller),
            view_generation: 0,
            owned_sequence: 0,
            grafana: None,
            queued,
            overlay: None,
            scroll: 0,
            pending_confirmation: None,
        }
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn backend_label(&self) -> &str {
        &self.backend_label
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn scroll(&self) -> u16 {
        self.scroll
    }

    pub fn list_error(&self) -> Option<&str> {
        self.list_error.as_deref()
    }

    pub fn list_last_refresh(&self) -> Option<String> {
        self.list_refreshed
            .map(|stamp| stamp.format("%H:%M:%S").to_string())
    }

    pub fn detail(&self) -> Option<&DetailView> {
        self.detail.as_ref()
    }

    pub fn grafana(&self) -> Option<&GrafanaDashboards> {
        self.grafana.as_ref()
    }

    pub fn overlay(&self) -> Option<(&str, &str)> {
        self.overlay
            .as_ref()
            .map(|(title, text)| (title.as_str(), text.as_str()))
    }

    pub fn pending_confirmation_prompt(&self) -> Option<&str> {
        self.pending_confirmation
            .as_ref()
            .map(|pending| pending.prompt.as_str())
    }

    pub fn visible_services(&self) -> Vec<&InferenceService> {
        let filter = self.filter.to_ascii_lowercase();
        self.services
            .iter()
            .filter(|isvc| filter.is_empty() || isvc.name().to_ascii_lowercase().contains(&filter))
            .collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        let len = self.visible_services().len();
        (len > 0).then(|| self.selected.min(len - 1))
    }

    pub fn selected_service(&self) -> Option<&InferenceService> {
        let index = self.selected_index()?;
        self.visible_services().get(index).copied()
    }

    pub fn pollers_in_flight(&self) -> usize {
        [&self.list_poller, &self.detail_poller, &self.logs_poller]
            .into_iter()
            .filter(|poller| poller.in_flight())
            .count()
    }

    /// Earliest instant at which one of the pollers wants to fetch.
    pub fn next_due(&self) -> Option<Instant> {
        [&self.list_poller, &self.detail_poller, &self.logs_poller]
            .into_iter()
            .filter_map(Poller::next_due)
            .min()
    }

    /// Drains queued one-shot work and issues a ticket for every due poller.
    pub fn due_requests(&mut self, now: Instant) -> Vec<FetchRequest> {
        let mut requests = std::mem::take(&mut self.queued);

        if let Some(ticket) = self.list_poller.take_due(now) {
            requests.push(FetchRequest::List {
                ticket,
                namespace: self.namespace.clone(),
            });
        }

        if let Some(detail) = &self.detail {
            if let Some(ticket) = self.detail_poller.take_due(now) {
                requests.push(FetchRequest::Detail {
                    ticket,
                    namespace: detail.namespace.clone(),
                    name: detail.name.clone(),
                });
            }
            if let Some(ticket) = self.logs_poller.take_due(now) {
                requests.push(FetchRequest::Logs {
                    ticket,
                    namespace: detail.namespace.clone(),
                    name: detail.name.clone(),
                    component: detail.logs_component,
                });
            }
        }

        requests
    }

    pub fn apply_fetch(&mut self, event: FetchEvent, now: Instant) {
        match event {
            FetchEvent::List { ticket, result } => {
                if !self.list_poller.complete(ticket, now) {
                    debug!("dropping stale list result");
                    return;
                }
                self.apply_list(result, now);
            }
            FetchEvent::Detail { ticket, result } => {
                if !self.detail_poller.complete(ticket, now) {
                    debug!("dropping stale detail result");
                    return;
                }
                self.apply_detail(result, now);
            }
            FetchEvent::Logs {
                ticket,
                component,
                result,
            } => {
                if !self.logs_poller.complete(ticket, now) {
                    debug!("dropping stale {component} logs");
                    return;
                }
                self.apply_logs(result, now);
            }
            FetchEvent::Owned { ticket, resources } => {
                let current = OwnedTicket {
                    view: self.view_generation,
                    sequence: self.owned_sequence,
                };
                if ticket != current {
                    debug!("dropping stale owned resources");
                    return;
                }
                if let Some(detail) = self.detail.as_mut() {
                    detail.owned = Some(resources);
                }
            }
            FetchEvent::Grafana(dashboards) => self.grafana = dashboards,
            FetchEvent::Created { namespace, result } => match result {
                Ok(isvc) => {
                    let name = isvc.name().to_string();
                    if namespace != self.namespace {
                        self.set_status(format!(
                            "Created inferenceservice {namespace}/{name} (now viewing '{}')",
                            self.namespace
                        ));
                        return;
                    }
                    self.set_status(format!("Created inferenceservice {namespace}/{name}"));
                    self.list_poller.reset(now);
                    self.open_detail(namespace, name, Some(isvc), now);
                }
                Err(error) => self.set_status(format!("Create failed: {error}")),
            },
            FetchEvent::Deleted {
                namespace,
                name,
                result,
            } => match result {
                Ok(()) => self.mark_deleted(&namespace, &name, now),
                Err(error) => {
                    self.set_status(format!("Delete failed for {namespace}/{name}: {error}"))
                }
            },
        }
    }

    fn apply_list(&mut self, result: Result<Vec<InferenceService>, String>, now: Instant) {
        match result {
            Ok(fresh) => {
                let selected = self.selected_identity();
                let first_load = self.list_refreshed.is_none();
                let recovered = self.list_error.take().is_some();
                let changed = merge_list(&mut self.services, fresh);
                self.list_refreshed = Some(Local::now());
                if changed {
                    self.list_poller.reset(now);
                    self.restore_selection(selected);
                }
                if (changed || first_load || recovered)
                    && self.screen == Screen::List
                    && self.mode == InputMode::Normal
                {
                    self.status = format!(
                        "{} InferenceServices in '{}'",
                        self.services.len(),
                        self.namespace
                    );
                }
            }
            Err(error) => {
                let summary = summarize_error_line(&error);
                self.list_error = Some(error);
                self.set_status(format!("Refresh failed: {summary}"));
            }
        }
    }

    fn apply_detail(&mut self, result: Result<InferenceService, String>, now: Instant) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        match result {
            Ok(fresh) => {
                let report = merge(&mut detail.isvc, fresh);
                detail.error = None;
                detail.last_refresh = Some(Local::now());
                if report.changed() {
                    self.detail_poller.reset(now);
                }
                if report.status {
                    self.queue_owned();
                }
            }
            Err(error) => {
                let summary = summarize_error_line(&error);
                detail.error = Some(error);
                self.set_status(format!("Refresh failed: {summary}"));
            }
        }
    }

    fn apply_logs(&mut self, result: Result<PodLogs, String>, now: Instant) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        match result {
            Ok(logs) => {
                detail.logs_error = None;
                if detail.logs.as_ref() != Some(&logs) {
                    detail.logs = Some(logs);
                    self.logs_poller.reset(now);
                }
            }
            Err(error) => detail.logs_error = Some(error),
        }
    }

    fn queue_owned(&mut self) {
        let Some(isvc) = self.detail.as_ref().and_then(|detail| detail.isvc.clone()) else {
            return;
        };
        self.owned_sequence += 1;
        self.queued.push(FetchRequest::Owned {
            ticket: OwnedTicket {
                view: self.view_generation,
                sequence: self.owned_sequence,
            },
            isvc: Box::new(isvc),
        });
    }

    fn mark_deleted(&mut self, namespace: &str, name: &str, now: Instant) {
        let deleted_at = Time(k8s_openapi::jiff::Timestamp::now());
        if let Some(isvc) = self
            .services
            .iter_mut()
            .find(|isvc| isvc.identity() == (Some(namespace), name))
        {
            isvc.metadata.deletion_timestamp = Some(deleted_at);
        }

        let viewing = self
            .detail
            .as_ref()
            .is_some_and(|detail| detail.namespace == namespace && detail.name == name);
        if viewing {
            self.close_detail(now);
        }
        self.list_poller.reset(now);
        self.set_status(format!("Deleting inferenceservice {namespace}/{name}"));
    }

    pub fn apply_action(&mut self, action: Action) -> AppCommand {
        if let Some(pending) = self.pending_confirmation.take() {
            match action {
                Action::ConfirmYes | Action::Enter => {
                    self.status = format!("Confirmed: {}", pending.prompt);
                    return pending.command;
                }
                Action::ConfirmNo | Action::CancelInput | Action::Back => {
                    self.status = "Action cancelled".to_string();
                    return AppCommand::None;
                }
                _ => {
                    self.pending_confirmation = Some(pending);
                    self.status =
                        "Pending confirmation: press y to confirm or n to cancel".to_string();
                    return AppCommand::None;
                }
            }
        }

        if !matches!(action, Action::GPrefix) {
            self.pending_g = false;
        }

        if self.show_help && !matches!(action, Action::ToggleHelp) {
            self.show_help = false;
        }

        let now = Instant::now();
        match action {
            Action::Quit => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            Action::Down => {
                self.move_cursor(1);
                AppCommand::None
            }
            Action::Up => {
                self.move_cursor(-1);
                AppCommand::None
            }
            Action::PageDown => {
                self.move_cursor(10);
                AppCommand::None
            }
            Action::PageUp => {
                self.move_cursor(-10);
                AppCommand::None
            }
            Action::Top => {
                self.cursor_to_top();
                AppCommand::None
            }
            Action::Bottom => {
                if self.scrolls_text() {
                    self.scroll = u16::MAX / 2;
                } else {
                    self.selected = self.visible_services().len().saturating_sub(1);
                }
                AppCommand::None
            }
            Action::GPrefix => {
                if self.pending_g {
                    self.pending_g = false;
                    self.cursor_to_top();
                } else {
                    self.pending_g = true;
                }
                AppCommand::None
            }
            Action::NextTab => {
                self.switch_detail_tab(1, now);
                AppCommand::None
            }
            Action::PrevTab => {
                self.switch_detail_tab(-1, now);
                AppCommand::None
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                AppCommand::None
            }
            Action::Enter => {
                if self.screen == Screen::List && self.overlay.is_none() {
                    self.open_selected(now);
                }
                AppCommand::None
            }
            Action::Back => {
                if self.overlay.take().is_some() {
                    self.scroll = 0;
                    self.status = "Closed template".to_string();
                } else if self.screen == Screen::Detail {
                    self.close_detail(now);
                    self.status = "Back to InferenceServices".to_string();
                } else if !self.filter.is_empty() {
                    self.filter.clear();
                    self.status = "Filter cleared".to_string();
                }
                AppCommand::None
            }
            Action::ShowLogs => {
                self.set_detail_tab(DetailTab::Logs, now);
                AppCommand::None
            }
            Action::NextComponent => {
                let next = self
                    .detail
                    .as_ref()
                    .map(|detail| next_component(detail.logs_component));
                if let Some(component) = next {
                    self.watch_logs(component, now);
                }
                AppCommand::None
            }
            Action::ShowTemplate => {
                self.show_template();
                AppCommand::None
            }
            Action::DeleteSelected => self.prompt_delete(),
            Action::Refresh => {
                self.refresh(now);
                AppCommand::None
            }
            Action::StartCommand => {
                self.mode = InputMode::Command;
                self.input.clear();
                self.status = "Command mode (:help for commands)".to_string();
                AppCommand::None
            }
            Action::StartFilter => {
                self.mode = InputMode::Filter;
                self.input = self.filter.clone();
                self.status = "Filter mode".to_string();
                AppCommand::None
            }
            Action::SubmitInput => self.submit_input(now),
            Action::CancelInput => {
                self.mode = InputMode::Normal;
                self.input.clear();
                self.status = "Input cancelled".to_string();
                AppCommand::None
            }
            Action::Backspace => {
                self.input.pop();
                AppCommand::None
            }
            Action::DeleteWord => {
                while self.input.ends_with(' ') {
                    self.input.pop();
                }
                while !self.input.ends_with(' ') && !self.input.is_empty() {
                    self.input.pop();
                }
                AppCommand::None
            }
            Action::InputChar(c) => {
                self.input.push(c);
                AppCommand::None
            }
            Action::ConfirmYes | Action::ConfirmNo => {
                self.status = "No pending confirmation".to_string();
                AppCommand::None
            }
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    fn submit_input(&mut self, now: Instant) -> AppCommand {
        match self.mode {
            InputMode::Normal => AppCommand::None,
            InputMode::Filter => {
                self.filter = self.input.trim().to_string();
                self.mode = InputMode::Normal;
                self.input.clear();
                self.selected = 0;
                if self.filter.is_empty() {
                    self.status = "Filter cleared".to_string();
                } else {
                    self.status = format!("Filter: '{}'", self.filter);
                }
                AppCommand::None
            }
            InputMode::Command => {
                let line = self.input.trim().to_string();
                self.mode = InputMode::Normal;
                self.input.clear();
                self.execute_command_line(&line, now)
            }
        }
    }

    fn execute_command_line(&mut self, line: &str, now: Instant) -> AppCommand {
        let line = line.trim_start_matches(':').trim();
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            self.status = "No command entered".to_string();
            return AppCommand::None;
        };

        match command {
            "q" | "quit" | "exit" => {
                self.running = false;
                self.status = "Exit requested".to_string();
                AppCommand::None
            }
            "help" | "h" => {
                self.show_help = true;
                AppCommand::None
            }
            "refresh" | "reload" | "r" => {
                self.refresh(now);
                AppCommand::None
            }
            "ns" | "namespace" => {
                let Some(namespace) = parts.next() else {
                    self.status = format!("Namespace is '{}' (usage: :ns <name>)", self.namespace);
                    return AppCommand::None;
                };
                self.switch_namespace(namespace.to_string(), now);
                AppCommand::None
            }
            "create" | "apply" => {
                let Some(path) = parts.next() else {
                    self.status = "Usage: :create <path-to-yaml>".to_string();
                    return AppCommand::None;
                };
                match std::fs::read_to_string(path) {
                    Ok(text) => self.submit_manifest(&text),
                    Err(error) => {
                        self.set_status(format!("Failed to read {path}: {error}"));
                        AppCommand::None
                    }
                }
            }
            "template" | "tpl" => {
                self.show_template();
                AppCommand::None
            }
            "logs" | "log" => {
                if self.detail.is_none() {
                    self.status = "Open an InferenceService first".to_string();
                    return AppCommand::None;
                }
                let component = match parts.next() {
                    Some(token) => match Component::from_token(token) {
                        Some(component) => component,
                        None => {
                            self.status = format!(
                                "Unknown component '{token}' (predictor, transformer, explainer)"
                            );
                            return AppCommand::None;
                        }
                    },
                    None => self
                        .detail
                        .as_ref()
                        .map(|detail| detail.logs_component)
                        .unwrap_or(Component::Predictor),
                };
                self.watch_logs(component, now);
                AppCommand::None
            }
            "delete" | "del" | "rm" => self.prompt_delete(),
            other => {
                self.status = format!("Unknown command ':{other}'");
                AppCommand::None
            }
        }
    }

    /// Validates a manifest and, only if it is acceptable, asks for creation.
    pub fn submit_manifest(&mut self, text: &str) -> AppCommand {
        match manifest::parse_submission(text, &self.namespace) {
            Ok(isvc) => {
                self.set_status(format!(
                    "Creating inferenceservice {}/{}",
                    self.namespace,
                    isvc.name()
                ));
                AppCommand::Create {
                    namespace: self.namespace.clone(),
                    isvc: Box::new(isvc),
                }
            }
            Err(error) => {
                self.set_status(format!("Submission rejected: {error}"));
                AppCommand::None
            }
        }
    }

    fn show_template(&mut self) {
        self.overlay = Some((
            "InferenceService template (save and submit with :create <file>)".to_string(),
            TEMPLATE.to_string(),
        ));
        self.scroll = 0;
        self.status = "Showing template".to_string();
    }

    fn prompt_delete(&mut self) -> AppCommand {
        let target = match self.screen {
            Screen::Detail => self
                .detail
                .as_ref()
                .map(|detail| (detail.namespace.clone(), detail.name.clone())),
            Screen::List => self.selected_service().map(|isvc| {
                (
                    isvc.namespace().unwrap_or(&self.namespace).to_string(),
                    isvc.name().to_string(),
                )
            }),
        };
        let Some((namespace, name)) = target else {
            self.status = "No InferenceService selected".to_string();
            return AppCommand::None;
        };

        let prompt = format!("Delete inferenceservice {namespace}/{name}?");
        self.status = format!("{prompt} (y/n)");
        self.pending_confirmation = Some(PendingConfirmation {
            prompt,
            command: AppCommand::Delete { namespace, name },
        });
        AppCommand::None
    }

    fn refresh(&mut self, now: Instant) {
        match self.screen {
            Screen::List => self.list_poller.reset(now),
            Screen::Detail => {
                self.detail_poller.reset(now);
                self.logs_poller.reset(now);
                self.queue_owned();
            }
        }
        self.status = format!("Refreshing '{}'", self.namespace);
    }

    fn switch_namespace(&mut self, namespace: String, now: Instant) {
        if self.screen == Screen::Detail {
            self.close_detail(now);
        }
        self.namespace = namespace;
        self.services.clear();
        self.selected = 0;
        self.list_error = None;
        self.list_refreshed = None;
        self.list_poller.restart(now);
        self.status = format!("Namespace set to '{}'", self.namespace);
    }

    fn open_selected(&mut self, now: Instant) {
        let Some(isvc) = self.selected_service().cloned() else {
            self.status = "No InferenceService selected".to_string();
            return;
        };
        let namespace = isvc.namespace().unwrap_or(&self.namespace).to_string();
        let name = isvc.name().to_string();
        self.open_detail(namespace, name, Some(isvc), now);
    }

    fn open_detail(
        &mut self,
        namespace: String,
        name: String,
        seed: Option<InferenceService>,
        now: Instant,
    ) {
        self.view_generation += 1;
        self.list_poller.stop();
        self.detail_poller.stop();
        self.logs_poller.stop();

        self.status = format!("Viewing inferenceservice {namespace}/{name}");
        self.detail = Some(DetailView::new(namespace, name, seed));
        self.screen = Screen::Detail;
        self.overlay = None;
        self.scroll = 0;
        self.detail_poller.start(now);
        self.queue_owned();
    }

    fn close_detail(&mut self, now: Instant) {
        self.view_generation += 1;
        self.detail_poller.stop();
        self.logs_poller.stop();
        self.detail = None;
        self.screen = Screen::List;
        self.scroll = 0;
        self.list_poller.start(now);
    }

    fn switch_detail_tab(&mut self, delta: isize, now: Instant) {
        let Some(tab) = self.detail.as_ref().map(|detail| detail.tab.offset(delta)) else {
            return;
        };
        self.set_detail_tab(tab, now);
    }

    fn set_detail_tab(&mut self, tab: DetailTab, now: Instant) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let previous = detail.tab;
        detail.tab = tab;
        self.scroll = 0;

        match (previous == DetailTab::Logs, tab == DetailTab::Logs) {
            (false, true) => self.logs_poller.start(now),
            (true, false) => self.logs_poller.stop(),
            _ => {}
        }
    }

    /// Points the logs poller at another component. Any in-flight fetch for
    /// the previous component is orphaned so its result cannot land here.
    fn watch_logs(&mut self, component: Component, now: Instant) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let changed = detail.logs_component != component;
        detail.logs_component = component;
        if changed {
            detail.logs = None;
            detail.logs_error = None;
        }
        if detail.tab != DetailTab::Logs {
            self.set_detail_tab(DetailTab::Logs, now);
        } else if changed {
            self.logs_poller.restart(now);
        }
        self.status = format!("Showing {component} logs");
    }

    fn scrolls_text(&self) -> bool {
        self.overlay.is_some() || self.screen == Screen::Detail
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.scrolls_text() {
            self.scroll = self.scroll.saturating_add_signed(delta as i16);
            return;
        }
        let len = self.visible_services().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        let current = self.selected.min(len - 1) as isize;
        self.selected = (current + delta).clamp(0, len as isize - 1) as usize;
    }

    fn cursor_to_top(&mut self) {
        if self.scrolls_text() {
            self.scroll = 0;
        } else {
            self.selected = 0;
        }
    }

    fn selected_identity(&self) -> Option<(Option<String>, String)> {
        self.selected_service().map(|isvc| {
            (
                isvc.namespace().map(str::to_string),
                isvc.name().to_string(),
            )
        })
    }

    fn restore_selection(&mut self, identity: Option<(Option<String>, String)>) {
        let Some((namespace, name)) = identity else {
            return;
        };
        if let Some(index) = self
            .visible_services()
            .iter()
            .position(|isvc| isvc.identity() == (namespace.as_deref(), name.as_str()))
        {
            self.selected = index;
        }
    }
}

fn next_component(component: Component) -> Component {
    let index = Component::ALL
        .iter()
        .position(|candidate| *candidate == component)
        .unwrap_or_default();
    Component::ALL[(index + 1) % Component::ALL.len()]
}

fn summarize_error_line(error: &str) -> String {
    error
        .lines()
        .find(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, AppCommand, DetailTab, FetchEvent, FetchRequest, Screen};
    use crate::input::Action;
    use crate::model::{Component, InferenceService, PodLogs};
    use crate::owned::{ChainResult, OwnedResources};
    use crate::poller::PollerConfig;
    use crate::status::{StatusPhase, inference_service_status};
    use std::time::{Duration, Instant};

    fn app() -> App {
        App::new(
            "test".to_string(),
            "models".to_string(),
            PollerConfig::default(),
            PollerConfig::new(Duration::from_secs(3), Duration::from_secs(12), 3),
            None,
        )
    }

    fn isvc(name: &str, ready: &str) -> InferenceService {
        serde_json::from_value(serde_json::json!({
            "metadata": {"name": name, "namespace": "models"},
            "spec": {"predictor": {"sklearn": {"storageUri": "gs://models/iris"}}},
            "status": {
                "conditions": [{"type": "Ready", "status": ready}],
                "components": {"predictor": {"latestCreatedRevision": format!("{name}-predictor-00001")}}
            }
        }))
        .expect("valid isvc")
    }

    fn type_command(app: &mut App, line: &str) -> AppCommand {
        app.apply_action(Action::StartCommand);
        for c in line.chars() {
            app.apply_action(Action::InputChar(c));
        }
        app.apply_action(Action::SubmitInput)
    }

    fn empty_owned() -> OwnedResources {
        OwnedResources {
            predictor: ChainResult::Empty,
            transformer: ChainResult::Empty,
            explainer: ChainResult::Empty,
        }
    }

    /// Runs the list poller once and feeds `services` back as its result.
    fn load_list(app: &mut App, services: Vec<InferenceService>) {
        let now = Instant::now();
        let ticket = app
            .due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::List { ticket, .. } => Some(ticket),
                _ => None,
            })
            .expect("list fetch due");
        app.apply_fetch(
            FetchEvent::List {
                ticket,
                result: Ok(services),
            },
            now,
        );
    }

    #[test]
    fn list_poller_fetches_active_namespace_first() {
        let mut app = app();
        let requests = app.due_requests(Instant::now());
        assert!(matches!(
            requests.as_slice(),
            [FetchRequest::List { namespace, .. }] if namespace == "models"
        ));
        assert_eq!(app.pollers_in_flight(), 1);
        assert!(app.due_requests(Instant::now()).is_empty());
    }

    #[test]
    fn grafana_probe_is_queued_once() {
        let mut app = App::new(
            "test".to_string(),
            "models".to_string(),
            PollerConfig::default(),
            PollerConfig::default(),
            Some("http://grafana".to_string()),
        );
        let requests = app.due_requests(Instant::now());
        assert!(
            requests
                .iter()
                .any(|request| matches!(request, FetchRequest::Grafana { prefix } if prefix == "http://grafana"))
        );
        let again = app.due_requests(Instant::now() + Duration::from_secs(60));
        assert!(!again.iter().any(|request| matches!(request, FetchRequest::Grafana { .. })));
    }

    #[test]
    fn list_refresh_keeps_selection_by_identity() {
        let mut app = app();
        load_list(&mut app, vec![isvc("a", "True"), isvc("b", "True")]);
        app.apply_action(Action::Down);
        assert_eq!(app.selected_service().map(InferenceService::name), Some("b"));

        load_list(
            &mut app,
            vec![isvc("0-new", "False"), isvc("a", "True"), isvc("b", "True")],
        );
        assert_eq!(app.selected_service().map(InferenceService::name), Some("b"));
    }

    #[test]
    fn namespace_switch_orphans_in_flight_list_fetch() {
        let mut app = app();
        let now = Instant::now();
        let stale = match app.due_requests(now).pop() {
            Some(FetchRequest::List { ticket, .. }) => ticket,
            other => panic!("expected list request, got {other:?}"),
        };

        let command = type_command(&mut app, "ns serving");
        assert_eq!(command, AppCommand::None);
        assert_eq!(app.namespace(), "serving");

        app.apply_fetch(
            FetchEvent::List {
                ticket: stale,
                result: Ok(vec![isvc("from-models", "True")]),
            },
            now,
        );
        assert!(app.visible_services().is_empty());

        let requests = app.due_requests(Instant::now());
        assert!(matches!(
            requests.as_slice(),
            [FetchRequest::List { namespace, .. }] if namespace == "serving"
        ));
    }

    #[test]
    fn stale_detail_events_after_leaving_do_not_mutate_state() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "False")]);
        app.apply_action(Action::Enter);
        assert_eq!(app.screen(), Screen::Detail);

        let now = Instant::now();
        let mut detail_ticket = None;
        let mut owned_ticket = None;
        for request in app.due_requests(now) {
            match request {
                FetchRequest::Detail { ticket, .. } => detail_ticket = Some(ticket),
                FetchRequest::Owned { ticket, .. } => owned_ticket = Some(ticket),
                _ => {}
            }
        }
        let detail_ticket = detail_ticket.expect("detail fetch");
        let owned_ticket = owned_ticket.expect("owned resolution");

        app.apply_action(Action::Back);
        assert_eq!(app.screen(), Screen::List);

        app.apply_fetch(
            FetchEvent::Detail {
                ticket: detail_ticket,
                result: Ok(isvc("iris", "True")),
            },
            now,
        );
        app.apply_fetch(
            FetchEvent::Owned {
                ticket: owned_ticket,
                resources: empty_owned(),
            },
            now,
        );
        assert!(app.detail().is_none());

        app.apply_action(Action::Enter);
        app.apply_fetch(
            FetchEvent::Detail {
                ticket: detail_ticket,
                result: Ok(isvc("iris", "True")),
            },
            now,
        );
        let stored = app.detail().and_then(|detail| detail.isvc()).expect("seeded");
        assert_eq!(inference_service_status(stored).phase, StatusPhase::Waiting);
        assert!(app.detail().and_then(|detail| detail.owned()).is_none());
    }

    #[test]
    fn status_change_on_detail_triggers_chain_resolution() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "False")]);
        app.apply_action(Action::Enter);

        let now = Instant::now();
        let ticket = app
            .due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::Detail { ticket, .. } => Some(ticket),
                _ => None,
            })
            .expect("detail fetch");

        app.apply_fetch(
            FetchEvent::Detail {
                ticket,
                result: Ok(isvc("iris", "True")),
            },
            now,
        );

        let requests = app.due_requests(now);
        assert!(requests.iter().any(|request| matches!(request, FetchRequest::Owned { .. })));
        assert!(requests.iter().any(|request| matches!(request, FetchRequest::Detail { .. })));
        let stored = app.detail().and_then(|detail| detail.isvc()).expect("stored");
        assert_eq!(inference_service_status(stored).phase, StatusPhase::Ready);
    }

    #[test]
    fn switching_log_component_drops_previous_result() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "True")]);
        app.apply_action(Action::Enter);
        app.apply_action(Action::ShowLogs);

        let now = Instant::now();
        let ticket = app
            .due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::Logs {
                    ticket, component, ..
                } => {
                    assert_eq!(component, Component::Predictor);
                    Some(ticket)
                }
                _ => None,
            })
            .expect("logs fetch");

        type_command(&mut app, "logs transformer");
        let mut predictor_logs = PodLogs::new();
        predictor_logs.insert("iris-predictor-abc".to_string(), vec!["ready".to_string()]);
        app.apply_fetch(
            FetchEvent::Logs {
                ticket,
                component: Component::Predictor,
                result: Ok(predictor_logs),
            },
            now,
        );

        let detail = app.detail().expect("detail");
        assert_eq!(detail.tab(), DetailTab::Logs);
        assert_eq!(detail.logs_component(), Component::Transformer);
        assert!(detail.logs().is_none());
        assert!(app.due_requests(Instant::now()).iter().any(|request| matches!(
            request,
            FetchRequest::Logs { component: Component::Transformer, .. }
        )));
    }

    fn list_ticket(app: &mut App, now: Instant) -> crate::poller::PollTicket {
        app.due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::List { ticket, .. } => Some(ticket),
                _ => None,
            })
            .expect("list fetch due")
    }

    fn detail_ticket(app: &mut App, now: Instant) -> crate::poller::PollTicket {
        app.due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::Detail { ticket, .. } => Some(ticket),
                _ => None,
            })
            .expect("detail fetch due")
    }

    #[test]
    fn identical_list_refreshes_back_off_and_changes_reset() {
        let mut app = app();
        let mut now = Instant::now();
        let ticket = list_ticket(&mut app, now);
        app.apply_fetch(
            FetchEvent::List {
                ticket,
                result: Ok(vec![isvc("iris", "True")]),
            },
            now,
        );
        assert_eq!(app.list_poller.current_backoff(), Duration::from_secs(1));

        for expected in [2, 4] {
            now = app.next_due().expect("scheduled");
            let ticket = list_ticket(&mut app, now);
            app.apply_fetch(
                FetchEvent::List {
                    ticket,
                    result: Ok(vec![isvc("iris", "True")]),
                },
                now,
            );
            assert_eq!(
                app.list_poller.current_backoff(),
                Duration::from_secs(expected)
            );
        }

        now = app.next_due().expect("scheduled");
        let ticket = list_ticket(&mut app, now);
        app.apply_fetch(
            FetchEvent::List {
                ticket,
                result: Ok(vec![isvc("iris", "False")]),
            },
            now,
        );
        assert_eq!(app.list_poller.current_backoff(), Duration::from_secs(1));
        assert_eq!(app.next_due(), Some(now));
    }

    #[test]
    fn identical_detail_refresh_backs_off_and_change_resets() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "False")]);
        app.apply_action(Action::Enter);

        let now = Instant::now();
        let ticket = detail_ticket(&mut app, now);
        app.apply_fetch(
            FetchEvent::Detail {
                ticket,
                result: Ok(isvc("iris", "False")),
            },
            now,
        );
        assert_eq!(app.detail_poller.current_backoff(), Duration::from_secs(2));

        let later = now + Duration::from_secs(1);
        let ticket = detail_ticket(&mut app, later);
        app.apply_fetch(
            FetchEvent::Detail {
                ticket,
                result: Ok(isvc("iris", "True")),
            },
            later,
        );
        assert_eq!(app.detail_poller.current_backoff(), Duration::from_secs(1));
        assert!(app.due_requests(later).iter().any(|request| matches!(request, FetchRequest::Detail { .. })));
    }

    #[test]
    fn newer_owned_request_supersedes_older_one_in_same_view() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "False")]);
        app.apply_action(Action::Enter);

        let now = Instant::now();
        let mut first_owned = None;
        let mut detail = None;
        for request in app.due_requests(now) {
            match request {
                FetchRequest::Owned { ticket, .. } => first_owned = Some(ticket),
                FetchRequest::Detail { ticket, .. } => detail = Some(ticket),
                _ => {}
            }
        }
        let first_owned = first_owned.expect("initial owned resolution");
        app.apply_fetch(
            FetchEvent::Detail {
                ticket: detail.expect("detail fetch"),
                result: Ok(isvc("iris", "True")),
            },
            now,
        );
        let second_owned = app
            .due_requests(now)
            .into_iter()
            .find_map(|request| match request {
                FetchRequest::Owned { ticket, .. } => Some(ticket),
                _ => None,
            })
            .expect("owned resolution after status change");
        assert_ne!(first_owned, second_owned);

        app.apply_fetch(
            FetchEvent::Owned {
                ticket: first_owned,
                resources: OwnedResources {
                    predictor: ChainResult::Failed("outdated".to_string()),
                    transformer: ChainResult::Empty,
                    explainer: ChainResult::Empty,
                },
            },
            now,
        );
        assert!(app.detail().and_then(|detail| detail.owned()).is_none());

        app.apply_fetch(
            FetchEvent::Owned {
                ticket: second_owned,
                resources: empty_owned(),
            },
            now,
        );
        let owned = app
            .detail()
            .and_then(|detail| detail.owned())
            .expect("latest resolution applied");
        assert!(matches!(owned.get(Component::Predictor), ChainResult::Empty));
    }

    #[test]
    fn create_finishing_after_namespace_switch_stays_on_list() {
        let mut app = app();
        let command =
            app.submit_manifest("metadata:\n  name: flowers\nspec:\n  predictor:\n    tensorflow: {}\n");
        let AppCommand::Create { namespace, isvc } = command else {
            panic!("expected create command");
        };

        type_command(&mut app, "ns serving");
        app.apply_fetch(
            FetchEvent::Created {
                namespace,
                result: Ok(*isvc),
            },
            Instant::now(),
        );

        assert_eq!(app.screen(), Screen::List);
        assert!(app.detail().is_none());
        assert!(app.status().contains("models/flowers"), "{}", app.status());
        assert!(app.status().contains("'serving'"), "{}", app.status());
    }

    #[test]
    fn delete_requires_confirmation_and_marks_row_terminating() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "True")]);

        assert_eq!(app.apply_action(Action::DeleteSelected), AppCommand::None);
        assert!(app.pending_confirmation_prompt().is_some());
        let command = app.apply_action(Action::ConfirmYes);
        assert_eq!(
            command,
            AppCommand::Delete {
                namespace: "models".to_string(),
                name: "iris".to_string()
            }
        );

        app.apply_fetch(
            FetchEvent::Deleted {
                namespace: "models".to_string(),
                name: "iris".to_string(),
                result: Ok(()),
            },
            Instant::now(),
        );
        let row = app.selected_service().expect("row kept until refresh");
        assert_eq!(inference_service_status(row).phase, StatusPhase::Terminating);
        assert!(app.next_due().is_some());
    }

    #[test]
    fn delete_can_be_cancelled() {
        let mut app = app();
        load_list(&mut app, vec![isvc("iris", "True")]);
        app.apply_action(Action::DeleteSelected);
        assert_eq!(app.apply_action(Action::ConfirmNo), AppCommand::None);
        assert!(app.pending_confirmation_prompt().is_none());
    }

    #[test]
    fn manifest_without_metadata_never_produces_a_create() {
        let mut app = app();
        let command = app.submit_manifest("spec:\n  predictor:\n    sklearn: {}\n");
        assert_eq!(command, AppCommand::None);
        assert!(app.status().contains("metadata"), "{}", app.status());
    }

    #[test]
    fn valid_manifest_creates_in_active_namespace_and_opens_detail() {
        let mut app = app();
        let command = app.submit_manifest("metadata:\n  name: flowers\nspec:\n  predictor:\n    tensorflow: {}\n");
        let AppCommand::Create { namespace, isvc } = command else {
            panic!("expected create command");
        };
        assert_eq!(namespace, "models");
        assert_eq!(isvc.namespace(), Some("models"));

        app.apply_fetch(
            FetchEvent::Created {
                namespace,
                result: Ok(*isvc),
            },
            Instant::now(),
        );
        assert_eq!(app.screen(), Screen::Detail);
        assert_eq!(app.detail().map(|detail| detail.name()), Some("flowers"));
    }

    #[test]
    fn list_errors_are_kept_and_polling_continues() {
        let mut app = app();
        let now = Instant::now();
        let ticket = match app.due_requests(now).pop() {
            Some(FetchRequest::List { ticket, .. }) => ticket,
            other => panic!("expected list request, got {other:?}"),
        };
        app.apply_fetch(
            FetchEvent::List {
                ticket,
                result: Err("connection refused".to_string()),
            },
            now,
        );
        assert_eq!(app.list_error(), Some("connection refused"));
        assert!(app.status().contains("connection refused"));
        assert!(app.next_due().is_some());
    }

    #[test]
    fn template_overlay_closes_on_back() {
        let mut app = app();
        type_command(&mut app, "template");
        assert!(app.overlay().is_some_and(|(_, text)| text.contains("InferenceService")));
        app.apply_action(Action::Back);
        assert!(app.overlay().is_none());
    }
}
