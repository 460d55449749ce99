use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetSize};
use ratatui::{
    layout::{Alignment, Flex, Layout, Rect},
    prelude::{Constraint, CrosstermBackend, Stylize},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Clear, Gauge, Paragraph, Wrap},
    Frame, Terminal, TerminalOptions, Viewport,
};
use std::{io, panic};
use tokio::time::Instant;

use crate::{
    connection::{ConnectionState, ConnectionView},
    liveness::{LastSeen, LivenessView},
    panel::{HandPanel, HandPanelResult, Prompt},
    servo::ServoView,
};

const HELP: &str = "`1`-`5` toggle servo | arrows + space select/toggle | `a` all on | \
    `x` all off | `q`, `Esc` or `Ctrl-C` quit";

pub fn render(app: &mut HandPanel, frame: &mut Frame) {
    let now = Instant::now();
    let rects = Layout::vertical([
        Constraint::Length(4),
        Constraint::Min(9),
        Constraint::Length(3),
    ])
    .split(frame.size());

    render_status(
        app.connection_view(),
        app.liveness_view(now),
        app.rejected_reports(),
        frame,
        rects[0],
    );
    render_servos(&app.servo_views(), app.selected, frame, rects[1]);

    frame.render_widget(
        Paragraph::new(HELP)
            .block(
                Block::bordered()
                    .title("Robotic Hand")
                    .title_alignment(Alignment::Center)
                    .border_type(BorderType::Rounded),
            )
            .style(Style::default().fg(Color::Cyan).bg(Color::Black))
            .centered(),
        rects[2],
    );

    if let Some(prompt) = app.prompt() {
        render_prompt(prompt, frame);
    }
}

fn connection_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    }
}

fn liveness_line(liveness: &LivenessView) -> Line<'static> {
    let (color, text) = match liveness.last_seen {
        LastSeen::Now => (Color::Green, "online".to_string()),
        LastSeen::Never => (Color::Red, "offline, never seen".to_string()),
        LastSeen::Ago(_) => {
            let at = liveness
                .last_heartbeat
                .map(|t| format!(" ({})", t.format("%H:%M:%S")))
                .unwrap_or_default();
            (
                Color::Red,
                format!("offline, last seen {}{at}", liveness.last_seen),
            )
        }
    };
    Line::from(vec![
        Span::raw("Device: "),
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(text, Style::default().fg(color)),
    ])
}

pub fn render_status(
    connection: ConnectionView,
    liveness: LivenessView,
    rejected: u64,
    f: &mut Frame,
    area: Rect,
) {
    let color = connection_color(connection.state);
    let mut broker = vec![
        Span::raw("Broker: "),
        Span::styled("● ", Style::default().fg(color)),
        Span::styled(connection.label, Style::default().fg(color)),
    ];
    if rejected > 0 {
        broker.push(Span::styled(
            format!("   ({rejected} malformed status reports dropped)"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    f.render_widget(
        Paragraph::new(vec![Line::from(broker), liveness_line(&liveness)]).block(
            Block::bordered()
                .title("Status")
                .border_type(BorderType::Rounded),
        ),
        area,
    );
}

pub fn render_servos(servos: &[ServoView], selected: usize, f: &mut Frame, area: Rect) {
    let columns = Layout::horizontal(servos.iter().map(|_| Constraint::Ratio(1, 5))).split(area);

    for (idx, (servo, col)) in servos.iter().zip(columns.iter()).enumerate() {
        render_servo_card(servo, idx == selected, f, *col);
    }
}

fn render_servo_card(servo: &ServoView, selected: bool, f: &mut Frame, area: Rect) {
    let (fg, border) = match (servo.active, selected) {
        (true, true) => (Color::Green, Color::Yellow),
        (true, false) => (Color::Green, Color::Green),
        (false, true) => (Color::Gray, Color::Yellow),
        (false, false) => (Color::Gray, Color::DarkGray),
    };

    let mut block = Block::bordered()
        .title(servo.channel.to_string())
        .title_alignment(Alignment::Center)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border));
    if selected {
        block = block.border_type(BorderType::Thick);
    }

    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
    ])
    .split(inner);

    let mut label = Style::default().fg(fg);
    if servo.active {
        label = label.add_modifier(Modifier::BOLD);
    }
    f.render_widget(
        Paragraph::new(servo.label).style(label).centered(),
        rows[0],
    );
    f.render_widget(
        Paragraph::new(format!("Angle: {}°", servo.angle)).centered(),
        rows[1],
    );

    // needle sweeps -90..=90 around straight up
    let ratio = (f64::from(servo.needle_rotation) + 90.0) / 180.0;
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(fg).bg(Color::Black))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(format!("{:+}°", servo.needle_rotation)),
        rows[3],
    );
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    area
}

pub fn render_prompt(prompt: &Prompt, f: &mut Frame) {
    let (title, color, lines) = match prompt {
        Prompt::Alert(msg) => (
            "Error",
            Color::Red,
            vec![
                Line::from(msg.clone()),
                Line::from(""),
                Line::from("Press Enter to dismiss").italic(),
            ],
        ),
        Prompt::ConfirmBlind(command) => (
            "Device offline",
            Color::Yellow,
            vec![
                Line::from("The device is not sending heartbeats."),
                Line::from(format!("Send '{command}' anyway?")),
                Line::from(""),
                Line::from("y: send   n: cancel").italic(),
            ],
        ),
    };

    let area = popup_area(f.size(), 50, lines.len() as u16 + 2);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .centered()
            .block(
                Block::bordered()
                    .title(title)
                    .title_alignment(Alignment::Center)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(color)),
            )
            .style(Style::default().bg(Color::Black)),
        area,
    );
}

#[derive(Debug)]
pub struct Tui {
    terminal: Terminal<CrosstermBackend<io::Stderr>>,
    col: u16,
    row: u16,
}

const TERM_COL: u16 = 110;
const TERM_ROW: u16 = 20;

impl Tui {
    pub fn new() -> Result<Self, std::io::Error> {
        // keep track of prev terminal size before resizing
        let (col, row) = crossterm::terminal::size()?;
        crossterm::execute!(std::io::stdout(), SetSize(TERM_COL, TERM_ROW),)?;

        let options = TerminalOptions {
            viewport: Viewport::Fixed(Rect::new(0, 0, TERM_COL, TERM_ROW)),
        };

        Ok(Self {
            terminal: Terminal::with_options(CrosstermBackend::new(io::stderr()), options)?,
            col,
            row,
        })
    }

    pub fn init(&mut self) -> HandPanelResult<()> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stderr(), EnterAlternateScreen)?;

        let panic_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic| {
            if let Err(e) = Self::reset() {
                eprintln!("failed to reset the terminal: {e:}");
            }
            panic_hook(panic);
        }));

        self.terminal.clear()?;
        Ok(())
    }

    pub fn draw(&mut self, app: &mut HandPanel) -> HandPanelResult<()> {
        self.terminal.draw(|frame| render(app, frame))?;
        Ok(())
    }

    fn reset() -> HandPanelResult<()> {
        terminal::disable_raw_mode()?;
        crossterm::execute!(io::stderr(), LeaveAlternateScreen)?;
        Ok(())
    }

    pub fn exit(&mut self) -> HandPanelResult<()> {
        Self::reset()?;
        crossterm::execute!(
            io::stderr(),
            crossterm::terminal::SetSize(self.col, self.row)
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPublisher;
    use hand_broker::{Topics, TransportEvent};
    use ratatui::backend::TestBackend;
    use std::sync::Arc;

    fn screen(app: &mut HandPanel) -> String {
        let mut terminal = Terminal::new(TestBackend::new(110, 20)).expect("test terminal");
        terminal.draw(|f| render(app, f)).expect("draw");
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_cards_and_indicators() {
        let mut app = HandPanel::new(Topics::default(), Arc::new(RecordingPublisher::default()));
        app.connect();
        let text = screen(&mut app);
        assert!(text.contains("Connecting..."));
        assert!(text.contains("never seen"));
        assert!(text.contains("Servo 1"));
        assert!(text.contains("Servo 5"));
        assert!(text.contains("Angle: 180°"));
        assert!(text.contains("Disabled"));
    }

    #[test]
    fn renders_alert_popup() {
        let mut app = HandPanel::new(Topics::default(), Arc::new(RecordingPublisher::default()));
        app.set_all(hand_broker::ServoState::On);
        let text = screen(&mut app);
        assert!(text.contains("not connected to the MQTT broker"));
    }

    #[test]
    fn renders_online_device() {
        let mut app = HandPanel::new(Topics::default(), Arc::new(RecordingPublisher::default()));
        let now = Instant::now();
        app.handle_transport(TransportEvent::Connected, now);
        app.handle_transport(
            TransportEvent::Message {
                topic: "mao_robotica/status".to_string(),
                payload: b"1,1,0,0,0".to_vec(),
            },
            now,
        );
        let text = screen(&mut app);
        assert!(text.contains("online"));
        assert!(text.contains("Enabled"));
        assert!(text.contains("Angle: 40°"));
    }
}
