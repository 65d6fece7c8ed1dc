use crate::{
    controller::{
        DashboardView,
        SyncState,
    },
    session::{
        ActionKind,
        PendingAction,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ethers::{
    types::{
        Address,
        U256,
    },
    utils::format_ether,
};
use futures::StreamExt;
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};

pub enum UserEvent {
    Quit,
    Redraw,
    Connect { passphrase: String },
    Disconnect,
    Refresh,
    EnterLottery,
    PickWinner,
    SwitchAccount { name: String },
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    accounts: Vec<String>,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    ConnectModal(ConnectState),
    AccountModal(AccountState),
    QuitModal,
}

#[derive(Clone, Debug, Default)]
struct ConnectState {
    passphrase: String,
}

#[derive(Clone, Debug, Default)]
struct AccountState {
    idx: usize,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Single persistent terminal so buffers survive across draws.
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(?err, "input event stream error");
                    break;
                }
            }
        }
    });
    rx
}

pub async fn next_raw_event(events: &mut InputEventReceiver) -> Result<Event> {
    events
        .recv()
        .await
        .ok_or_else(|| eyre!("input event stream closed"))
}

/// Turns a raw terminal event into a user intent, driving modal state
/// along the way. Returns `None` for events nobody cares about.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };

    match &mut state.mode {
        Mode::Normal => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('c') => {
                state.mode = Mode::ConnectModal(ConnectState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('d') => Some(UserEvent::Disconnect),
            KeyCode::Char('a') => {
                state.mode = Mode::AccountModal(AccountState::default());
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            KeyCode::Char('e') => Some(UserEvent::EnterLottery),
            KeyCode::Char('w') => Some(UserEvent::PickWinner),
            _ => None,
        },
        Mode::ConnectModal(cs) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let passphrase = cs.passphrase.clone();
                state.mode = Mode::Normal;
                Some(UserEvent::Connect { passphrase })
            }
            KeyCode::Backspace => {
                cs.passphrase.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                cs.passphrase.push(c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::AccountModal(acc) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                acc.idx = acc.idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if acc.idx + 1 < state.accounts.len() {
                    acc.idx += 1;
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let selected = state.accounts.get(acc.idx).cloned();
                state.mode = Mode::Normal;
                selected.map(|name| UserEvent::SwitchAccount { name })
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

pub fn draw(state: &mut UiState, view: &DashboardView) -> Result<()> {
    // Cache the account list for the picker modal.
    state.accounts = view.accounts.clone();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| render(f, state, view))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn render(f: &mut Frame, state: &UiState, view: &DashboardView) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(7),
            Constraint::Length(11),
            Constraint::Length(3),
            Constraint::Min(4),
        ])
        .split(f.area());

    render_header(f, rows[0], view);
    render_hero(f, rows[1], view);
    render_cards(f, rows[2], view);
    render_admin(f, rows[3], view);
    render_status(f, rows[4], view);

    match &state.mode {
        Mode::Normal => {}
        Mode::ConnectModal(cs) => render_connect_modal(f, cs),
        Mode::AccountModal(acc) => render_account_modal(f, state, acc),
        Mode::QuitModal => render_quit_modal(f),
    }
}

fn render_header(f: &mut Frame, area: Rect, view: &DashboardView) {
    let account = match (&view.state, &view.session) {
        (SyncState::Connecting, _) => {
            Span::styled("Connecting...", Style::default().fg(Color::Yellow))
        }
        (SyncState::Connected, Some(session)) => Span::styled(
            format!("● {}", short_address(&session.address)),
            Style::default().fg(Color::Green),
        ),
        _ => Span::styled("○ Connect Wallet (c)", Style::default().fg(Color::DarkGray)),
    };
    let line = Line::from(vec![
        Span::styled(
            "Decentralized Lottery",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        account,
    ]);
    let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_hero(f: &mut Frame, area: Rect, view: &DashboardView) {
    let pool = view
        .snapshot
        .map(|s| format_eth(s.prize_pool(), 3))
        .unwrap_or_else(|| "-.---".to_string());
    let lines = vec![
        Line::from(Span::styled(
            "CURRENT PRIZE POOL",
            Style::default().fg(Color::Cyan),
        )),
        Line::from(Span::styled(
            format!("{pool} ETH"),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::raw("")),
        Line::from(Span::styled(
            "Next draw  00 : 46 : 22",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let hero = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(hero, area);
}

fn render_cards(f: &mut Frame, area: Rect, view: &DashboardView) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    let fee = view
        .snapshot
        .map(|s| format_eth(s.entrance_fee, 3))
        .unwrap_or_else(|| "-.---".to_string());
    let tickets = Paragraph::new(vec![
        Line::from(Span::styled(
            "Decentralized lottery mode improved.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::raw("")),
        Line::from(Span::raw("Cost to Enter")),
        Line::from(Span::styled(
            format!("{fee} ETH"),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::raw("")),
        Line::from(Span::styled(
            "[e] buy a ticket",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("BUY TICKETS"))
    .wrap(Wrap { trim: true });
    f.render_widget(tickets, columns[0]);

    let (balance, account) = match &view.session {
        Some(session) => (
            format_eth(session.balance, 4),
            short_address(&session.address),
        ),
        None => ("-.----".to_string(), "not connected".to_string()),
    };
    let wallet = Paragraph::new(vec![
        Line::from(Span::styled(
            "Balance of your connected account.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(Span::raw("")),
        Line::from(vec![
            Span::styled(
                balance,
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" ETH", Style::default().fg(Color::DarkGray)),
        ]),
        Line::from(Span::raw("")),
        Line::from(Span::styled(account, Style::default().fg(Color::DarkGray))),
    ])
    .block(Block::default().borders(Borders::ALL).title("MY WALLET"))
    .wrap(Wrap { trim: true });
    f.render_widget(wallet, columns[1]);

    let inner_width = columns[2].width.saturating_sub(2) as usize;
    let results = Paragraph::new(results_lines(view, inner_width))
        .block(Block::default().borders(Borders::ALL).title("RESULTS"))
        .wrap(Wrap { trim: true });
    f.render_widget(results, columns[2]);
}

fn results_lines(view: &DashboardView, width: usize) -> Vec<Line<'static>> {
    let Some(snapshot) = view.snapshot else {
        return vec![Line::from(Span::styled(
            "Connect to load lottery state.",
            Style::default().fg(Color::DarkGray),
        ))];
    };
    vec![
        Line::from(vec![
            Span::raw("Players  "),
            Span::styled(
                player_badges(snapshot.player_count),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(Span::raw("")),
        Line::from(Span::styled(
            "RECENT WINNER",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(Span::raw(fit_to_width(
            &winner_label(snapshot.recent_winner.as_ref()),
            width,
        ))),
    ]
}

fn render_admin(f: &mut Frame, area: Rect, view: &DashboardView) {
    let action = match view.pending {
        PendingAction::Submitted(kind) => Span::styled(
            format!("waiting for confirmation ({})...", kind.describe()),
            Style::default().fg(Color::Yellow),
        ),
        PendingAction::Confirmed(ActionKind::PickWinner) => {
            Span::styled("winner picked", Style::default().fg(Color::Green))
        }
        _ => Span::styled(
            "[w] End Lottery & Pick Winner",
            Style::default().fg(Color::Red),
        ),
    };
    let admin = Paragraph::new(Line::from(vec![
        Span::raw("Only the contract owner can execute this action.  "),
        action,
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("ADMIN CONTROLS"),
    );
    f.render_widget(admin, area);
}

fn render_status(f: &mut Frame, area: Rect, view: &DashboardView) {
    let mut lines = vec![Line::from(Span::raw(view.status.clone()))];
    if !view.errors.is_empty() {
        let summary = view.errors.iter().take(2).join("  |  ");
        lines.push(Line::from(Span::styled(
            summary,
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(Span::styled(
        "c connect · d disconnect · a accounts · r refresh · e enter · w pick winner · q quit",
        Style::default().fg(Color::DarkGray),
    )));
    let status = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });
    f.render_widget(status, area);
}

fn render_connect_modal(f: &mut Frame, cs: &ConnectState) {
    let area = centered_rect(f.area(), 50, 7);
    let masked = "•".repeat(cs.passphrase.chars().count());
    let body = Paragraph::new(vec![
        Line::from(Span::raw("Enter wallet passphrase:")),
        Line::from(Span::styled(
            masked,
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Enter to connect · Esc to cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("CONNECT WALLET"),
    );
    f.render_widget(Clear, area);
    f.render_widget(body, area);
}

fn render_account_modal(f: &mut Frame, state: &UiState, acc: &AccountState) {
    let height = (state.accounts.len() as u16 + 4).max(6);
    let area = centered_rect(f.area(), 40, height);
    let items: Vec<ListItem> = if state.accounts.is_empty() {
        vec![ListItem::new("(no wallets found)")]
    } else {
        state
            .accounts
            .iter()
            .map(|name| ListItem::new(name.clone()))
            .collect()
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("ACCOUNTS"))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    let mut list_state = ListState::default().with_selected(Some(acc.idx));
    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_quit_modal(f: &mut Frame) {
    let area = centered_rect(f.area(), 30, 5);
    let body = Paragraph::new(vec![
        Line::from(Span::raw("Quit the dashboard?")),
        Line::from(Span::styled(
            "y / Enter to quit · n / Esc to stay",
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("QUIT"));
    f.render_widget(Clear, area);
    f.render_widget(body, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Renders a wei amount as ETH with a fixed number of fraction digits
/// (truncating, not rounding, to match the upstream display).
pub fn format_eth(value: U256, decimals: usize) -> String {
    let raw = format_ether(value);
    match raw.split_once('.') {
        Some((whole, frac)) => {
            if decimals == 0 {
                whole.to_string()
            } else {
                let mut frac = frac.to_string();
                frac.truncate(decimals);
                while frac.len() < decimals {
                    frac.push('0');
                }
                format!("{whole}.{frac}")
            }
        }
        None => {
            if decimals == 0 {
                raw
            } else {
                format!("{raw}.{}", "0".repeat(decimals))
            }
        }
    }
}

pub fn short_address(address: &Address) -> String {
    let full = format!("{address:#x}");
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// The contract reports the all-zero address until a winner exists; the
/// snapshot carries that as `None`.
pub fn winner_label(winner: Option<&Address>) -> String {
    match winner {
        Some(address) => format!("{address:#x}"),
        None => "Pending...".to_string(),
    }
}

fn player_badges(count: u64) -> String {
    let shown = count.min(5);
    let mut badges = (1..=shown).map(|i| format!("P{i}")).join(" ");
    if count > shown {
        badges.push_str(&format!(" +{}", count - shown));
    }
    if badges.is_empty() {
        badges.push_str("(none yet)");
    }
    badges
}

/// Clips a string to a display width, appending an ellipsis when cut.
pub fn fit_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}
