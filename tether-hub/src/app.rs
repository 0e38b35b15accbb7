use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Widget},
    Frame,
};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tether_core::{AppEntry, PeerInfo, StatusReport, TransferDirection};

use crate::command::COMMANDS;
use crate::hub::HubEvent;

#[derive(Debug, Clone)]
pub enum UiEvent {
    Key(crossterm::event::KeyEvent),
    Resize(u16, u16),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionType {
    Command,
    Path,
}

#[derive(Debug, Clone)]
pub struct CompletionOption {
    pub display: String,
    pub value: String,
    pub is_dir: bool,
}

#[derive(Debug, Default)]
pub struct CompletionState {
    pub options: Vec<CompletionOption>,
    pub selected_index: usize,
    pub active: bool,
    pub trigger_type: Option<CompletionType>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Main,
    Satellite,
}

/// What the hub knows about the paired satellite.
#[derive(Debug, Default)]
pub struct SatelliteInfo {
    /// Display name while connected.
    pub name: Option<String>,
    pub telemetry: Option<StatusReport>,
    pub apps: Vec<AppEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferInfo {
    pub direction: TransferDirection,
    pub progress: i32,
}

#[derive(Debug)]
pub struct App {
    pub status: String,
    pub satellite: SatelliteInfo,
    pub transfer: Option<TransferInfo>,
    pub candidates: Vec<PeerInfo>,
    pub command_to_execute: String,
    pub logs: Vec<String>,
    pub log_scroll: usize,
    pub autoscroll: bool,
    pub completion: CompletionState,
    pub exit: bool,
    pub last_input_time: std::time::Instant,
    pub needs_completion_update: bool,
    pub active_tab: Tab,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            status: "Idle".to_string(),
            satellite: SatelliteInfo::default(),
            transfer: None,
            candidates: Vec::new(),
            command_to_execute: String::new(),
            logs: vec![
                "Welcome to Tether Hub".to_string(),
                "Type `help` for commands".to_string(),
            ],
            log_scroll: 0,
            autoscroll: true,
            completion: CompletionState::default(),
            exit: false,
            last_input_time: std::time::Instant::now(),
            needs_completion_update: false,
            active_tab: Tab::Main,
        }
    }

    pub fn set_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    fn push_log(&mut self, msg: &str) {
        for line in msg.lines() {
            self.logs.push(line.to_string());
        }
        if self.autoscroll {
            self.log_scroll = 0;
        }
    }

    pub fn update(&mut self, event: HubEvent) {
        match event {
            HubEvent::Log(msg) => self.push_log(&msg),
            HubEvent::Status(status) => self.status = status,
            HubEvent::Connected(name) => {
                self.push_log(&format!("Satellite connected: {name}"));
                self.satellite.name = Some(name);
                self.candidates.clear();
            }
            HubEvent::Disconnected => {
                self.push_log("Satellite disconnected");
                self.satellite.name = None;
                self.satellite.telemetry = None;
            }
            HubEvent::Error(msg) => self.push_log(&format!("error: {msg}")),
            HubEvent::Candidates(peers) => {
                self.push_log("Several satellites answered; pick one with `connect <index>`");
                for (i, peer) in peers.iter().enumerate() {
                    self.push_log(&format!("- [{i}] {peer}"));
                }
                self.candidates = peers;
            }
            HubEvent::Apps(apps) => {
                self.push_log(&format!("[RECV] {} apps", apps.len()));
                self.satellite.apps = apps;
            }
            HubEvent::Progress(direction, progress) => {
                self.transfer = Some(TransferInfo {
                    direction,
                    progress,
                });
                match progress {
                    100 => self.push_log(&format!("[DONE] {direction} complete")),
                    -1 => self.push_log(&format!("{direction} failed")),
                    _ => {}
                }
            }
            HubEvent::Telemetry(report) => self.satellite.telemetry = Some(report),
        }
    }

    // ── Input line ───────────────────────────────────────────────

    pub fn on_input_change(&mut self) {
        self.last_input_time = std::time::Instant::now();
        self.needs_completion_update = true;
    }

    pub fn update_completion(&mut self) {
        if !self.needs_completion_update {
            return;
        }
        self.needs_completion_update = false;
        self.trigger_completion();
    }

    pub fn handle_tab(&mut self) {
        if self.completion.active && !self.completion.options.is_empty() {
            self.completion.selected_index =
                (self.completion.selected_index + 1) % self.completion.options.len();
        } else {
            self.trigger_completion();
        }
    }

    pub fn handle_up(&mut self) {
        if self.completion.active && !self.completion.options.is_empty() {
            if self.completion.selected_index == 0 {
                self.completion.selected_index = self.completion.options.len() - 1;
            } else {
                self.completion.selected_index -= 1;
            }
        } else {
            self.log_scroll = (self.log_scroll + 1).min(self.logs.len().saturating_sub(1));
            self.autoscroll = false;
        }
    }

    pub fn handle_down(&mut self) {
        if self.completion.active && !self.completion.options.is_empty() {
            self.completion.selected_index =
                (self.completion.selected_index + 1) % self.completion.options.len();
        } else {
            self.log_scroll = self.log_scroll.saturating_sub(1);
            if self.log_scroll == 0 {
                self.autoscroll = true;
            }
        }
    }

    pub fn handle_enter(&mut self) -> Option<String> {
        if self.completion.active && !self.completion.options.is_empty() {
            self.apply_completion();
            self.completion.active = false;
            None
        } else if !self.command_to_execute.trim().is_empty() {
            let cmd = std::mem::take(&mut self.command_to_execute);
            self.completion.active = false;
            Some(cmd)
        } else {
            None
        }
    }

    pub fn handle_esc(&mut self) {
        if self.completion.active {
            self.completion.active = false;
        } else {
            self.exit = true;
        }
    }

    fn trigger_completion(&mut self) {
        let input = self.command_to_execute.as_str();

        // First word: command names.
        if !input.contains(' ') {
            let lower = input.to_lowercase();
            let options: Vec<CompletionOption> = COMMANDS
                .iter()
                .filter(|cmd| cmd.starts_with(&lower))
                .map(|cmd| CompletionOption {
                    display: cmd.to_string(),
                    value: cmd.to_string(),
                    is_dir: false,
                })
                .collect();
            self.completion.trigger_type = Some(CompletionType::Command);
            self.completion.active = !options.is_empty();
            self.completion.options = options;
            self.completion.selected_index = 0;
            return;
        }

        // `send <path>`: local files.
        let Some(arg) = input.strip_prefix("send ") else {
            self.completion.active = false;
            return;
        };
        let (dir, prefix) = split_path_prefix(arg.trim_start());
        let mut entries: Vec<CompletionOption> = std::fs::read_dir(&dir)
            .map(|read_dir| {
                read_dir
                    .flatten()
                    .filter_map(|entry| {
                        let name = entry.file_name().to_string_lossy().to_string();
                        name.to_lowercase()
                            .starts_with(&prefix.to_lowercase())
                            .then(|| CompletionOption {
                                display: name.clone(),
                                value: name,
                                is_dir: entry.path().is_dir(),
                            })
                    })
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then(a.display.cmp(&b.display)));

        self.completion.trigger_type = Some(CompletionType::Path);
        self.completion.active = !entries.is_empty();
        self.completion.options = entries;
        self.completion.selected_index = 0;
    }

    fn apply_completion(&mut self) {
        let Some(choice) = self.completion.options.get(self.completion.selected_index) else {
            return;
        };
        if self.completion.trigger_type == Some(CompletionType::Command) {
            self.command_to_execute = format!("{} ", choice.value);
            return;
        }
        let arg = self
            .command_to_execute
            .strip_prefix("send ")
            .unwrap_or_default()
            .trim_start();
        let mut completed = match arg.rfind(['/', MAIN_SEPARATOR]) {
            Some(i) => arg[..=i].to_string(),
            None => String::new(),
        };
        completed.push_str(&choice.value);
        if choice.is_dir {
            completed.push(MAIN_SEPARATOR);
        }
        self.command_to_execute = format!("send {completed}");
    }

    // ── Rendering ────────────────────────────────────────────────

    pub fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let buf = frame.buffer_mut();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let tab_titles = [(" [F1] Console ", Tab::Main), (" [F2] Satellite ", Tab::Satellite)];
        let tab_spans: Vec<Span> = tab_titles
            .iter()
            .map(|(title, tab)| {
                let style = if *tab == self.active_tab {
                    Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Span::styled(*title, style)
            })
            .collect();
        Paragraph::new(Line::from(tab_spans))
            .block(Block::bordered().border_style(Style::default().fg(Color::DarkGray)))
            .render(layout[0], buf);

        match self.active_tab {
            Tab::Main => self.render_main_tab(layout[1], buf),
            Tab::Satellite => self.render_satellite_tab(layout[1], buf),
        }
    }

    fn render_main_tab(&self, area: Rect, buf: &mut Buffer) {
        let outer_block = Block::bordered()
            .title(
                Line::from(vec![
                    Span::raw(" Tether-Hub---"),
                    Span::styled(
                        self.status.as_str(),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(" "),
                ])
                .centered(),
            )
            .border_set(border::THICK)
            .border_style(Style::default().fg(Color::DarkGray));
        let inner_area = outer_block.inner(area);
        outer_block.render(area, buf);

        let main_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(inner_area);
        let input_area = main_layout[1];

        let top_layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(main_layout[0]);

        self.render_logs(top_layout[0], buf);
        self.render_sidebar(top_layout[1], buf);

        // Input
        let input_block = Block::default()
            .borders(Borders::TOP)
            .border_style(Style::default().fg(Color::DarkGray));
        let input_inner = input_block.inner(input_area);
        input_block.render(input_area, buf);
        Paragraph::new(Line::from(vec![
            Span::styled(" > ", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
            Span::raw(&self.command_to_execute),
        ]))
        .render(input_inner, buf);

        // Autocomplete dropdown, above the input bar.
        if self.completion.active && !self.completion.options.is_empty() {
            let num_options = self.completion.options.len().min(10);
            let dropdown_height = (num_options + 2) as u16;
            let dropdown_area = Rect {
                x: input_inner.x + 3,
                y: input_area.y.saturating_sub(dropdown_height),
                width: 40.min(inner_area.width.saturating_sub(4)),
                height: dropdown_height,
            };
            Clear.render(dropdown_area, buf);

            let items: Vec<ListItem> = self
                .completion
                .options
                .iter()
                .enumerate()
                .map(|(i, opt)| {
                    let style = if i == self.completion.selected_index {
                        Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD)
                    } else {
                        Style::default()
                    };
                    let marker = if opt.is_dir {
                        Span::styled("+ ", Style::default().fg(Color::Yellow))
                    } else {
                        Span::raw("  ")
                    };
                    ListItem::new(Line::from(vec![marker, Span::styled(&opt.display, style)]))
                })
                .collect();
            List::new(items)
                .block(
                    Block::bordered()
                        .border_style(Style::default().fg(Color::Cyan))
                        .title(Span::styled(
                            " Suggestions ",
                            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                        )),
                )
                .render(dropdown_area, buf);
        }
    }

    fn render_logs(&self, area: Rect, buf: &mut Buffer) {
        let logs_block = Block::bordered()
            .title(Line::from(vec![
                Span::styled(" Hub Logs ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
                if self.autoscroll {
                    Span::styled("[Autoscroll]", Style::default().fg(Color::Green).add_modifier(Modifier::DIM))
                } else {
                    Span::styled("[Manual]", Style::default().fg(Color::Yellow).add_modifier(Modifier::DIM))
                },
            ]))
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(ratatui::widgets::Padding::horizontal(1));
        let logs_inner = logs_block.inner(area);
        logs_block.render(area, buf);

        let items: Vec<ListItem> = self
            .visible_logs(logs_inner.height as usize)
            .iter()
            .map(|log| {
                if let Some(rest) = log.strip_prefix("> ") {
                    ListItem::new(Line::from(vec![
                        Span::styled("> ", Style::default().fg(Color::Green)),
                        Span::raw(rest),
                    ]))
                } else if let Some(rest) = log.strip_prefix("- ") {
                    ListItem::new(Line::from(vec![
                        Span::styled("- ", Style::default().fg(Color::Blue)),
                        Span::styled(rest, Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)),
                    ]))
                } else if log.starts_with("[SEND]") {
                    ListItem::new(Line::from(vec![
                        Span::styled("-> ", Style::default().fg(Color::Cyan)),
                        Span::styled(log.as_str(), Style::default().fg(Color::DarkGray)),
                    ]))
                } else if log.starts_with("[RECV]") || log.starts_with("[DONE]") {
                    ListItem::new(Line::from(vec![
                        Span::styled("<- ", Style::default().fg(Color::Green)),
                        Span::styled(log.as_str(), Style::default().fg(Color::DarkGray)),
                    ]))
                } else if log.starts_with("error:") {
                    ListItem::new(Line::from(Span::styled(log.as_str(), Style::default().fg(Color::Red))))
                } else {
                    ListItem::new(Line::from(log.as_str()))
                }
            })
            .collect();
        List::new(items).render(logs_inner, buf);
    }

    /// The slice of logs that fits `height` rows; scroll 0 shows the tail.
    pub fn visible_logs(&self, height: usize) -> &[String] {
        let total = self.logs.len();
        if total <= height {
            return &self.logs;
        }
        let start = total.saturating_sub(height).saturating_sub(self.log_scroll);
        let end = (start + height).min(total);
        &self.logs[start..end]
    }

    fn render_sidebar(&self, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(9), Constraint::Length(3), Constraint::Min(0)])
            .split(area);

        let info_block = Block::bordered()
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(ratatui::widgets::Padding::horizontal(1));
        let info_inner = info_block.inner(layout[0]);
        info_block.render(layout[0], buf);

        let label = Style::default().fg(Color::Gray);
        let name = self.satellite.name.as_deref().unwrap_or("Not Connected");
        let mut info_text = vec![
            Line::from(Span::styled("Satellite :", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))),
            Line::from(vec![
                Span::styled("Name    : ", label),
                Span::styled(name, Style::default().fg(Color::Yellow)),
            ]),
        ];
        if let Some(report) = &self.satellite.telemetry {
            info_text.extend(telemetry_lines(report));
        }
        Paragraph::new(info_text).render(info_inner, buf);

        // Transfer gauge
        let (title, percent, color) = match self.transfer {
            None => (" Transfer ".to_string(), 0, Color::DarkGray),
            Some(TransferInfo { direction, progress: -1 }) => (format!(" {direction} failed "), 0, Color::Red),
            Some(TransferInfo { direction, progress }) => {
                (format!(" {direction} "), progress.clamp(0, 100) as u16, Color::Green)
            }
        };
        Gauge::default()
            .block(Block::bordered().title(title).border_style(Style::default().fg(Color::DarkGray)))
            .gauge_style(Style::default().fg(color))
            .percent(percent)
            .render(layout[1], buf);

        // Candidates
        let cand_block = Block::bordered()
            .title(Span::styled(" Candidates : ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)))
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(ratatui::widgets::Padding::horizontal(1));
        let cand_inner = cand_block.inner(layout[2]);
        cand_block.render(layout[2], buf);
        let items: Vec<ListItem> = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, peer)| ListItem::new(format!("[{i}] {peer}")))
            .collect();
        List::new(items).render(cand_inner, buf);
    }

    fn render_satellite_tab(&self, area: Rect, buf: &mut Buffer) {
        let layout = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let status_block = Block::bordered()
            .title(Span::styled(" Device Status ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)))
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(ratatui::widgets::Padding::uniform(1));
        let status_inner = status_block.inner(layout[0]);
        status_block.render(layout[0], buf);
        let lines = match &self.satellite.telemetry {
            Some(report) => telemetry_lines(report),
            None => vec![Line::from(Span::styled("No telemetry yet", Style::default().fg(Color::DarkGray)))],
        };
        Paragraph::new(lines).render(status_inner, buf);

        let apps_block = Block::bordered()
            .title(Span::styled(" Applications (`apps` to refresh) ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)))
            .border_style(Style::default().fg(Color::DarkGray))
            .padding(ratatui::widgets::Padding::horizontal(1));
        let apps_inner = apps_block.inner(layout[1]);
        apps_block.render(layout[1], buf);
        let items: Vec<ListItem> = self
            .satellite
            .apps
            .iter()
            .map(|app| {
                ListItem::new(Line::from(vec![
                    Span::styled(app.name.as_str(), Style::default().fg(Color::White)),
                    Span::styled(format!("  {}", app.package), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();
        List::new(items).render(apps_inner, buf);
    }
}

fn telemetry_lines(report: &StatusReport) -> Vec<Line<'_>> {
    let label = Style::default().fg(Color::Gray);
    let battery_color = match report.battery {
        0..=15 => Color::Red,
        16..=40 => Color::Yellow,
        _ => Color::Green,
    };
    let charging = if report.charging { " (charging)" } else { "" };
    vec![
        Line::from(vec![
            Span::styled("Battery : ", label),
            Span::styled(format!("{}%{charging}", report.battery), Style::default().fg(battery_color)),
        ]),
        Line::from(vec![
            Span::styled("DND     : ", label),
            Span::styled(
                if report.dnd { "on" } else { "off" },
                Style::default().fg(Color::Magenta),
            ),
        ]),
        Line::from(vec![
            Span::styled("Wi-Fi   : ", label),
            Span::styled(report.wifi.as_str(), Style::default().fg(Color::Yellow)),
        ]),
    ]
}

/// Split a partially typed path into the directory to list and the
/// file-name prefix to match.
fn split_path_prefix(arg: &str) -> (PathBuf, String) {
    if arg.is_empty() {
        return (PathBuf::from("."), String::new());
    }
    if arg.ends_with(['/', MAIN_SEPARATOR]) {
        return (PathBuf::from(arg), String::new());
    }
    let path = Path::new(arg);
    let prefix = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_default();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, prefix)
}
