use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap};

use crate::app::{App, DetailTab, DetailView, InputMode, Screen};
use crate::grafana::GrafanaDashboards;
use crate::model::{Component, InferenceService, OwnedKind, human_age};
use crate::owned::ChainResult;
use crate::status::{StatusPhase, UiStatus, inference_service_status, object_status};
use crate::variant::{resolve_component, resolve_explainer, resolve_predictor};

const BG: Color = Color::Rgb(9, 15, 25);
const PANEL: Color = Color::Rgb(16, 27, 44);
const ACCENT: Color = Color::Rgb(52, 211, 153);
const MUTED: Color = Color::Rgb(140, 156, 178);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const KEY: Color = Color::Rgb(103, 232, 249);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const PL_D: Color = Color::Rgb(82, 24, 124);

pub fn render(frame: &mut Frame, app: &App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], app);
    render_body(frame, root[1], app);
    render_footer(frame, root[2], app);

    if app.show_help() {
        render_help_modal(frame, app);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let view = match app.detail() {
        Some(detail) => format!("󰚩 {}", compact_text(detail.name(), 24)),
        None => "󰒋 inferenceservices".to_string(),
    };
    let filter = if app.filter().is_empty() {
        "-"
    } else {
        app.filter()
    };

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " SERVEDECK ", Color::Black, ACCENT, PL_A);
    push_powerline_segment(
        &mut spans,
        format!(" 󰠳 {} ", compact_text(app.backend_label(), 32)),
        Color::White,
        PL_A,
        PL_B,
    );
    push_powerline_segment(
        &mut spans,
        format!(" 󰉖 {} ", compact_text(app.namespace(), 20)),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" 󰈲 {} ", compact_text(filter, 14)),
        Color::White,
        PL_C,
        PL_D,
    );
    push_powerline_segment(&mut spans, format!(" {view} "), Color::White, PL_D, BG);

    let refreshed = match app.detail() {
        Some(detail) => detail.last_refresh(),
        None => app.list_last_refresh(),
    };
    let right = Line::from(Span::styled(
        format!("󰑓 {} ", refreshed.unwrap_or_else(|| "-".to_string())),
        Style::default().fg(MUTED).bg(BG),
    ));
    let right_width = spans_width(&right.spans) as u16;

    if area.width < 42 || right_width >= area.width {
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            area,
        );
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right_width)])
        .split(area);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        chunks[0],
    );
    frame.render_widget(
        Paragraph::new(right)
            .style(Style::default().bg(BG))
            .alignment(Alignment::Right),
        chunks[1],
    );
}

fn render_body(frame: &mut Frame, area: Rect, app: &App) {
    if let Some((title, text)) = app.overlay() {
        render_text_panel(
            frame,
            area,
            title,
            highlight_yaml_text(text),
            app.scroll(),
        );
        return;
    }

    match (app.screen(), app.detail()) {
        (Screen::Detail, Some(detail)) => render_detail(frame, area, app, detail),
        _ => render_list(frame, area, app),
    }
}

fn render_list(frame: &mut Frame, area: Rect, app: &App) {
    if let Some(error) = app.list_error() {
        let panel = Paragraph::new(Text::from(error.to_string()))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("InferenceServices Error")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(ERROR))
                    .style(Style::default().bg(PANEL)),
            )
            .style(Style::default().fg(ERROR));
        frame.render_widget(panel, area);
        return;
    }

    let services = app.visible_services();
    let headers = ["NAME", "STATUS", "PREDICTOR", "URL", "AGE"];
    let header_row = Row::new(headers.iter().map(|header| {
        Cell::from(*header).style(Style::default().add_modifier(Modifier::BOLD))
    }))
    .height(1)
    .style(Style::default().fg(ACCENT));

    let rows = services.iter().map(|isvc| {
        let status = inference_service_status(isvc);
        let (variant, _) = resolve_component(Component::Predictor, &isvc.spec.predictor);
        Row::new(vec![
            Cell::from(isvc.name().to_string()).style(Style::default().fg(Color::White)),
            Cell::from(format!("{} {}", phase_icon(status.phase), status.phase.label()))
                .style(Style::default().fg(phase_color(status.phase))),
            Cell::from(variant.label()).style(Style::default().fg(Color::White)),
            Cell::from(isvc.url().unwrap_or("-").to_string()).style(Style::default().fg(MUTED)),
            Cell::from(human_age(isvc.metadata.creation_timestamp.as_ref()))
                .style(Style::default().fg(Color::White)),
        ])
    });

    let block = Block::default()
        .title(format!("InferenceServices ({})", services.len()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT))
        .style(Style::default().bg(PANEL));

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(24),
            Constraint::Length(15),
            Constraint::Length(12),
            Constraint::Min(20),
            Constraint::Length(6),
        ],
    )
    .header(header_row)
    .block(block)
    .column_spacing(1)
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(24, 36, 58))
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("󰜴 ");

    let mut state = TableState::default();
    state.select(app.selected_index());
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_detail(frame: &mut Frame, area: Rect, app: &App, detail: &DetailView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(3)])
        .split(area);

    let selected = DetailTab::ALL
        .iter()
        .position(|tab| *tab == detail.tab())
        .unwrap_or_default();
    let tabs = Tabs::new(DetailTab::ALL.iter().map(|tab| tab.title()))
        .select(selected)
        .style(Style::default().fg(MUTED).bg(BG))
        .highlight_style(
            Style::default()
                .fg(Color::Black)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, chunks[0]);

    let lines = detail_lines(detail, app.grafana());
    let title = format!(
        "{}/{}  {}",
        detail.namespace(),
        detail.name(),
        detail.tab().title()
    );
    render_text_panel(frame, chunks[1], &title, Text::from(lines), app.scroll());
}

fn render_text_panel(frame: &mut Frame, area: Rect, title: &str, text: Text<'static>, scroll: u16) {
    let visible = area.height.saturating_sub(2) as usize;
    let max_scroll = text.lines.len().saturating_sub(visible).min(u16::MAX as usize) as u16;
    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((scroll.min(max_scroll), 0));
    frame.render_widget(paragraph, area);
}

fn detail_lines(detail: &DetailView, grafana: Option<&GrafanaDashboards>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(error) = detail.error() {
        lines.push(Line::from(Span::styled(
            format!("󰅚 {}", summarize(error)),
            Style::default().fg(ERROR),
        )));
        lines.push(Line::from(""));
    }

    let Some(isvc) = detail.isvc() else {
        lines.push(muted_line("Loading…"));
        return lines;
    };

    match detail.tab() {
        DetailTab::Overview => overview_lines(&mut lines, detail, isvc, grafana),
        DetailTab::Predictor | DetailTab::Transformer | DetailTab::Explainer => {
            if let Some(component) = detail.tab().component() {
                component_lines(&mut lines, detail, isvc, component);
            }
        }
        DetailTab::Logs => logs_lines(&mut lines, detail),
        DetailTab::Yaml => match serde_yaml::to_string(isvc) {
            Ok(yaml) => lines.extend(highlight_yaml_text(&yaml).lines),
            Err(error) => lines.push(Line::from(Span::styled(
                format!("failed to render YAML: {error}"),
                Style::default().fg(ERROR),
            ))),
        },
    }
    lines
}

fn overview_lines(
    lines: &mut Vec<Line<'static>>,
    detail: &DetailView,
    isvc: &InferenceService,
    grafana: Option<&GrafanaDashboards>,
) {
    let status = inference_service_status(isvc);
    lines.push(field_line("Name", isvc.name()));
    lines.push(field_line("Namespace", isvc.namespace().unwrap_or("-")));
    lines.push(status_line("Status", &status));
    lines.push(field_line("URL", isvc.url().unwrap_or("-")));
    lines.push(field_line("Internal URL", isvc.internal_url().unwrap_or("-")));
    lines.push(field_line(
        "Age",
        &human_age(isvc.metadata.creation_timestamp.as_ref()),
    ));

    lines.push(Line::from(""));
    lines.push(section_line("Components"));
    for component in Component::ALL {
        let Some(spec) = isvc.component_spec(component) else {
            continue;
        };
        let (variant, _) = resolve_component(component, spec);
        let revision = isvc
            .component_status(component)
            .and_then(|status| status.latest_ready_revision.as_deref())
            .unwrap_or("-");
        lines.push(field_line(
            component.title(),
            &format!("{}  ready revision {revision}", variant.label()),
        ));
    }

    let conditions = isvc
        .status
        .as_ref()
        .and_then(|status| status.conditions.as_deref())
        .unwrap_or_default();
    if !conditions.is_empty() {
        lines.push(Line::from(""));
        lines.push(section_line("Conditions"));
        for condition in conditions {
            let color = if condition.status == "True" {
                ACCENT
            } else {
                WARN
            };
            let mut spans = vec![
                Span::styled(format!("  {:<22}", condition.type_), Style::default().fg(KEY)),
                Span::styled(format!("{:<8}", condition.status), Style::default().fg(color)),
            ];
            if let Some(message) = condition.message.as_deref().filter(|m| !m.is_empty()) {
                spans.push(Span::styled(message.to_string(), Style::default().fg(MUTED)));
            }
            lines.push(Line::from(spans));
        }
    }

    metrics_lines(lines, detail, grafana);
}

/// Dashboard links per component, keyed by the resolved configuration and
/// revision. Hidden entirely without a Grafana that has the dashboards.
fn metrics_lines(
    lines: &mut Vec<Line<'static>>,
    detail: &DetailView,
    grafana: Option<&GrafanaDashboards>,
) {
    let (Some(grafana), Some(owned)) = (grafana, detail.owned()) else {
        return;
    };

    let mut section = Vec::new();
    for component in Component::ALL {
        let Some(chain) = owned.get(component).chain() else {
            continue;
        };
        let (Some(configuration), Some(revision)) = (
            chain.name_of(OwnedKind::Configuration),
            chain.name_of(OwnedKind::Revision),
        ) else {
            continue;
        };
        for link in grafana.revision_links(detail.namespace(), &configuration, &revision) {
            section.push(Line::from(vec![
                Span::styled(
                    format!("  {:<12}{:<22}", component.title(), link.title),
                    Style::default().fg(KEY),
                ),
                Span::styled(link.url, Style::default().fg(MUTED)),
            ]));
        }
    }

    if !section.is_empty() {
        lines.push(Line::from(""));
        lines.push(section_line("Metrics"));
        lines.extend(section);
    }
}

fn component_lines(
    lines: &mut Vec<Line<'static>>,
    detail: &DetailView,
    isvc: &InferenceService,
    component: Component,
) {
    let Some(spec) = isvc.component_spec(component) else {
        lines.push(muted_line(&format!("No {component} configured")));
        return;
    };

    let (variant, _) = resolve_component(component, spec);
    lines.push(field_line("Variant", variant.label()));
    match component {
        Component::Predictor => {
            let resolved = resolve_predictor(spec);
            push_optional(lines, "Model format", resolved.model_format());
            push_optional(lines, "Runtime", resolved.runtime());
            push_optional(lines, "Storage URI", resolved.storage_uri());
            push_optional(lines, "Runtime version", resolved.runtime_version());
            push_optional(lines, "Protocol", resolved.protocol_version());
        }
        Component::Explainer => {
            let resolved = resolve_explainer(spec);
            push_optional(lines, "Storage URI", resolved.storage_uri());
            push_optional(lines, "Runtime version", resolved.runtime_version());
        }
        Component::Transformer => {}
    }
    for image in spec.container_images() {
        lines.push(field_line("Image", &image));
    }
    let (min, max) = (spec.min_replicas(), spec.max_replicas());
    if min.is_some() || max.is_some() {
        lines.push(field_line(
            "Replicas",
            &format!(
                "{}..{}",
                min.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string()),
                max.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string())
            ),
        ));
    }
    push_optional(lines, "Service account", spec.service_account());

    if let Some(status) = isvc.component_status(component) {
        lines.push(Line::from(""));
        lines.push(section_line("Rollout"));
        push_optional(lines, "Latest created", status.latest_created_revision.as_deref());
        push_optional(lines, "Latest ready", status.latest_ready_revision.as_deref());
        push_optional(lines, "Rolled out", status.latest_rolledout_revision.as_deref());
        push_optional(lines, "Previous", status.previous_rolledout_revision.as_deref());
        for target in &status.traffic {
            lines.push(field_line(
                "Traffic",
                &format!(
                    "{}% → {}{}",
                    target.percent.unwrap_or_default(),
                    target.revision_name.as_deref().unwrap_or("latest"),
                    target
                        .tag
                        .as_deref()
                        .map(|tag| format!(" (tag {tag})"))
                        .unwrap_or_default()
                ),
            ));
        }
    }

    lines.push(Line::from(""));
    lines.push(section_line("Knative resources"));
    let Some(owned) = detail.owned() else {
        lines.push(muted_line("  resolving…"));
        return;
    };
    match owned.get(component) {
        ChainResult::Empty => lines.push(muted_line("  No revision created yet")),
        ChainResult::Failed(error) => lines.push(Line::from(Span::styled(
            format!("  󰅚 {}", summarize(error)),
            Style::default().fg(ERROR),
        ))),
        ChainResult::Resolved(chain) => {
            for kind in OwnedKind::CHAIN {
                match chain.get(kind) {
                    Some(object) => {
                        let status = object_status(object);
                        let name = chain.name_of(kind).unwrap_or_default();
                        lines.push(Line::from(vec![
                            Span::styled(format!("  {:<16}", kind.title()), Style::default().fg(KEY)),
                            Span::styled(
                                format!("{} {:<12}", phase_icon(status.phase), status.phase.label()),
                                Style::default().fg(phase_color(status.phase)),
                            ),
                            Span::raw(name),
                        ]));
                        if status.phase != StatusPhase::Ready && !status.message.is_empty() {
                            lines.push(muted_line(&format!("      {}", status.message)));
                        }
                    }
                    None => lines.push(muted_line(&format!("  {:<16}-", kind.title()))),
                }
            }
        }
    }
}

fn logs_lines(lines: &mut Vec<Line<'static>>, detail: &DetailView) {
    lines.push(Line::from(vec![
        Span::styled("Component ", Style::default().fg(MUTED)),
        Span::styled(
            detail.logs_component().title().to_string(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  (c to switch)", Style::default().fg(MUTED)),
    ]));
    if let Some(error) = detail.logs_error() {
        lines.push(Line::from(Span::styled(
            format!("󰅚 {}", summarize(error)),
            Style::default().fg(ERROR),
        )));
    }

    let Some(logs) = detail.logs() else {
        lines.push(muted_line("Loading logs…"));
        return;
    };
    if logs.is_empty() {
        lines.push(muted_line(&format!(
            "No {} pods found",
            detail.logs_component()
        )));
        return;
    }
    for (pod, pod_lines) in logs {
        lines.push(Line::from(""));
        lines.push(section_line(pod));
        lines.extend(pod_lines.iter().map(|line| Line::from(line.clone())));
    }
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    if matches!(app.mode(), InputMode::Normal) {
        let pending = app.pending_confirmation_prompt();
        let status_text = pending
            .map(|prompt| format!("{prompt} (y/n)"))
            .unwrap_or_else(|| app.status().to_string());
        let (status_fg, status_bg) = if pending.is_some() {
            (Color::Black, WARN)
        } else {
            (Color::White, PL_B)
        };

        let mut spans = Vec::new();
        push_powerline_segment(&mut spans, " 󰘳 nrm ", Color::White, PL_A, status_bg);
        push_powerline_segment(
            &mut spans,
            format!(
                " {} {} ",
                footer_status_icon(&status_text),
                compact_text(&status_text, area.width.saturating_sub(24).max(24) as usize)
            ),
            status_fg,
            status_bg,
            BG,
        );

        let in_flight = app.pollers_in_flight();
        let glance = if in_flight > 0 {
            format!("󰑓 {in_flight} ")
        } else {
            "? help ".to_string()
        };
        let right = Line::from(Span::styled(glance, Style::default().fg(MUTED).bg(BG)));
        let right_width = spans_width(&right.spans) as u16;
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(1), Constraint::Length(right_width)])
            .split(area);
        frame.render_widget(
            Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
            chunks[0],
        );
        frame.render_widget(
            Paragraph::new(right)
                .style(Style::default().bg(BG))
                .alignment(Alignment::Right),
            chunks[1],
        );
        return;
    }

    let (label, prompt, prompt_bg) = match app.mode() {
        InputMode::Filter => (" 󰈲 flt ", format!("/{}", app.input()), WARN),
        _ => (" 󰘳 cmd ", format!(":{}", app.input()), ACCENT),
    };
    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, label, Color::Black, prompt_bg, PL_B);
    push_powerline_segment(&mut spans, format!(" {prompt} "), Color::White, PL_B, BG);
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn render_help_modal(frame: &mut Frame, app: &App) {
    let area = centered_rect(72, 70, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(format!(
            "servedeck help  mode:{}  namespace:{}",
            help_mode_label(app.mode()),
            app.namespace()
        )),
        Line::from(""),
    ];
    lines.extend(HELP_LINES.iter().map(|line| Line::from(*line)));

    let modal = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title("Help")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(ACCENT))
                .style(Style::default().bg(PANEL)),
        )
        .style(Style::default().fg(Color::White));
    frame.render_widget(modal, area);
}

const HELP_LINES: [&str; 14] = [
    "Flow: Enter open  Esc back  r refresh  q quit",
    "Move: j/k  gg/G  PgUp/PgDn  Ctrl+d/Ctrl+u",
    "Detail: ←/→ or Tab switch tabs  l logs  c next component",
    "Delete: x or Del, then y to confirm / n to cancel",
    "Filter: / name substring, Esc on the list clears it",
    "",
    "Commands:",
    "  :ns <namespace>        switch namespace",
    "  :create <file.yaml>    validate and create an InferenceService",
    "  :template              show a starter manifest",
    "  :logs [component]      follow predictor, transformer or explainer logs",
    "  :delete                delete the selected InferenceService",
    "  :refresh               poll immediately",
    "  :q                     quit",
];

fn help_mode_label(mode: InputMode) -> &'static str {
    match mode {
        InputMode::Normal => "normal",
        InputMode::Filter => "filter",
        InputMode::Command => "command",
    }
}

fn field_line(label: &str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<18}"), Style::default().fg(KEY)),
        Span::styled(value.to_string(), Style::default().fg(Color::White)),
    ])
}

fn push_optional(lines: &mut Vec<Line<'static>>, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|value| !value.is_empty()) {
        lines.push(field_line(label, value));
    }
}

fn status_line(label: &str, status: &UiStatus) -> Line<'static> {
    let mut spans = vec![
        Span::styled(format!("{label:<18}"), Style::default().fg(KEY)),
        Span::styled(
            format!("{} {}", phase_icon(status.phase), status.phase.label()),
            Style::default()
                .fg(phase_color(status.phase))
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if status.phase != StatusPhase::Ready && !status.message.is_empty() {
        spans.push(Span::styled(
            format!("  {}", status.message),
            Style::default().fg(MUTED),
        ));
    }
    Line::from(spans)
}

fn section_line(title: &str) -> Line<'static> {
    Line::from(Span::styled(
        title.to_string(),
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))
}

fn muted_line(text: &str) -> Line<'static> {
    Line::from(Span::styled(text.to_string(), Style::default().fg(MUTED)))
}

fn phase_color(phase: StatusPhase) -> Color {
    match phase {
        StatusPhase::Ready => ACCENT,
        StatusPhase::Waiting => Color::Rgb(125, 211, 252),
        StatusPhase::Terminating => MUTED,
        StatusPhase::Unavailable => WARN,
        StatusPhase::Warning => ERROR,
    }
}

fn phase_icon(phase: StatusPhase) -> &'static str {
    match phase {
        StatusPhase::Ready => "󰄬",
        StatusPhase::Waiting => "󰔟",
        StatusPhase::Terminating => "󰩺",
        StatusPhase::Unavailable => "󰋗",
        StatusPhase::Warning => "󰀦",
    }
}

fn footer_status_icon(status_text: &str) -> &'static str {
    let status = status_text.to_ascii_lowercase();
    let has_failure = [
        "failed",
        "error",
        "rejected",
        "timed out",
        "refused",
        "forbidden",
        "denied",
    ]
    .iter()
    .any(|needle| status.contains(needle));
    if has_failure { "󰅚" } else { "󰄬" }
}

fn summarize(error: &str) -> String {
    error.lines().next().unwrap_or_default().trim().to_string()
}

fn highlight_yaml_text(input: &str) -> Text<'static> {
    let lines = input
        .lines()
        .map(highlight_yaml_line)
        .collect::<Vec<Line<'static>>>();
    Text::from(lines)
}

fn highlight_yaml_line(line: &str) -> Line<'static> {
    let indent_len = line
        .as_bytes()
        .iter()
        .take_while(|byte| **byte == b' ')
        .count();
    let (indent, trimmed) = line.split_at(indent_len);

    let mut spans = vec![Span::raw(indent.to_string())];
    if trimmed.is_empty() {
        return Line::from(spans);
    }
    if trimmed.starts_with('#') {
        spans.push(Span::styled(trimmed.to_string(), Style::default().fg(MUTED)));
        return Line::from(spans);
    }

    let content = match trimmed.strip_prefix("- ") {
        Some(rest) => {
            spans.push(Span::styled("- ", Style::default().fg(ACCENT)));
            rest
        }
        None => trimmed,
    };
    match content.split_once(':') {
        Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
            spans.push(Span::styled(key.to_string(), Style::default().fg(KEY)));
            spans.push(Span::styled(":", Style::default().fg(MUTED)));
            if !value.trim().is_empty() {
                spans.push(Span::raw(" "));
                spans.push(Span::styled(
                    value.trim_start().to_string(),
                    Style::default().fg(yaml_value_color(value.trim())),
                ));
            }
        }
        _ => spans.push(Span::styled(content.to_string(), Style::default().fg(Color::White))),
    }
    Line::from(spans)
}

fn yaml_value_color(value: &str) -> Color {
    if value.starts_with('"') || value.starts_with('\'') {
        Color::Rgb(125, 211, 252)
    } else if matches!(value, "true" | "false" | "null" | "~") {
        WARN
    } else if value.parse::<f64>().is_ok() {
        Color::Rgb(251, 146, 60)
    } else {
        Color::Rgb(147, 197, 253)
    }
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}

fn compact_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    if max_chars <= 1 {
        return "…".to_string();
    }

    let mut out = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{compact_text, highlight_yaml_line, spans_width};

    #[test]
    fn compact_text_truncates_with_ellipsis() {
        assert_eq!(compact_text("sklearn-iris", 20), "sklearn-iris");
        assert_eq!(compact_text("sklearn-iris", 5), "skle…");
        assert_eq!(compact_text("sklearn-iris", 1), "…");
    }

    #[test]
    fn yaml_highlighting_keeps_text_intact() {
        let line = highlight_yaml_line("    storageUri: gs://bucket/model");
        let rendered = line
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect::<String>();
        assert_eq!(rendered, "    storageUri: gs://bucket/model");
        assert_eq!(spans_width(&line.spans), rendered.chars().count());
    }
}
