use crossterm::event::{Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use futures::{FutureExt, StreamExt};
use hand_broker::{ServoState, TransportEvent};
use std::{future::Future, time::Duration};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    panel::{HandPanel, HandPanelResult, Prompt},
    servo::ChannelId,
    HandPanelError,
};

pub enum Event {
    Tick,
    Key(KeyEvent),
    Transport(TransportEvent),
}

/// [`EventHandler`] merges the three event sources of the panel (the
/// redraw tick, terminal key presses and broker transport events) into one
/// queue, so the main loop handles exactly one event at a time
#[allow(dead_code)]
#[derive(Debug)]
pub struct EventHandler {
    sender: mpsc::UnboundedSender<Event>,
    receiver: mpsc::UnboundedReceiver<Event>,
    handler: tokio::task::JoinHandle<()>,
}

impl EventHandler {
    pub fn new(tick_rate_millis: u64, transport_rx: UnboundedReceiver<TransportEvent>) -> Self {
        let tick_rate = Duration::from_millis(tick_rate_millis);
        let (sender, receiver) = mpsc::unbounded_channel();
        let _sender = sender.clone();

        let mut transport_stream = UnboundedReceiverStream::new(transport_rx);

        let handler = tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick = tokio::time::interval(tick_rate);

            loop {
                let tick_delay = tick.tick();
                let crossterm_event = reader.next().fuse();
                let transport_event = transport_stream.next().fuse();

                tokio::select! {
                  _ = _sender.closed() => {
                    break;
                  }
                  _ = tick_delay => {
                    _sender.send(Event::Tick).ok();
                  }
                  Some(Ok(evt)) = crossterm_event => {
                    match evt {
                      CrosstermEvent::Key(key) => {
                        if key.kind == crossterm::event::KeyEventKind::Press {
                          _sender.send(Event::Key(key)).ok();
                        }
                      },
                      CrosstermEvent::Resize(_, _) => {
                        _sender.send(Event::Tick).ok();
                      }
                      e => {
                        log::trace!("Untracked term event {e:?}");
                      }
                    }
                  }
                  Some(evt) = transport_event => {
                    log::trace!("transport event {evt:?}");
                    _sender.send(Event::Transport(evt)).ok();
                  }
                };
            }
        });
        Self {
            sender,
            receiver,
            handler,
        }
    }

    pub async fn next(&mut self) -> HandPanelResult<Event> {
        self.receiver
            .recv()
            .await
            .ok_or(HandPanelError::EventError)
    }
}

/// One turn of the panel loop: applies the next event, or fires the
/// liveness decay if its deadline comes first
pub async fn step<F>(app: &mut HandPanel, next_event: F) -> HandPanelResult<()>
where
    F: Future<Output = HandPanelResult<Event>>,
{
    let decay = app.liveness_deadline();
    tokio::select! {
        _ = sleep_until_deadline(decay) => {
            app.expire_liveness(Instant::now());
        }
        event = next_event => match event? {
            Event::Tick => app.tick(Instant::now()),
            Event::Key(key) => handle_key_input_events(key, app),
            Event::Transport(evt) => app.handle_transport(evt, Instant::now()),
        }
    }
    Ok(())
}

/// Sleeps until the liveness decay deadline, or forever when none is armed
async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub fn handle_key_input_events(key_event: KeyEvent, app: &mut HandPanel) {
    // Exit application on `Ctrl-C`, whatever is on screen
    if matches!(key_event.code, KeyCode::Char('c') | KeyCode::Char('C'))
        && key_event.modifiers == KeyModifiers::CONTROL
    {
        app.quit();
        return;
    }

    match app.prompt() {
        Some(Prompt::Alert(_)) => {
            if matches!(key_event.code, KeyCode::Enter | KeyCode::Esc) {
                app.dismiss_alert();
            }
        }
        Some(Prompt::ConfirmBlind(_)) => match key_event.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_blind(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.decline(),
            _ => {}
        },
        None => match key_event.code {
            // Exit application on `ESC` or `q`
            KeyCode::Esc | KeyCode::Char('q') => app.quit(),
            KeyCode::Char(c @ '1'..='5') => {
                if let Some(channel) = c
                    .to_digit(10)
                    .and_then(|d| u8::try_from(d).ok())
                    .and_then(ChannelId::new)
                {
                    app.selected = channel.index();
                    app.toggle_servo(channel);
                }
            }
            KeyCode::Up | KeyCode::Left | KeyCode::Char('k') => app.select_prev(),
            KeyCode::Down | KeyCode::Right | KeyCode::Char('j') => app.select_next(),
            KeyCode::Char(' ') | KeyCode::Enter => app.toggle_selected(),
            KeyCode::Char('a') => app.set_all(ServoState::On),
            KeyCode::Char('x') => app.set_all(ServoState::Off),
            _ => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPublisher;
    use hand_broker::Topics;
    use std::sync::Arc;
    use tokio::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn connected_panel() -> (HandPanel, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut panel = HandPanel::new(Topics::default(), publisher.clone());
        let now = Instant::now();
        panel.handle_transport(TransportEvent::Connected, now);
        panel.handle_transport(
            TransportEvent::Message {
                topic: "mao_robotica/heartbeat".to_string(),
                payload: vec![],
            },
            now,
        );
        publisher.clear();
        (panel, publisher)
    }

    #[test]
    fn digit_keys_toggle_servos() {
        let (mut panel, publisher) = connected_panel();
        handle_key_input_events(key(KeyCode::Char('5')), &mut panel);
        assert_eq!(panel.selected, 4);
        assert_eq!(
            publisher.published(),
            vec![("mao_robotica/servo5".to_string(), "1".to_string())]
        );

        handle_key_input_events(key(KeyCode::Char(' ')), &mut panel);
        assert_eq!(publisher.published()[1].1, "0");
    }

    #[test]
    fn all_keys() {
        let (mut panel, publisher) = connected_panel();
        handle_key_input_events(key(KeyCode::Char('a')), &mut panel);
        handle_key_input_events(key(KeyCode::Char('x')), &mut panel);
        assert_eq!(
            publisher.published(),
            vec![
                ("mao_robotica/todos".to_string(), "1".to_string()),
                ("mao_robotica/todos".to_string(), "0".to_string())
            ]
        );
    }

    #[test]
    fn prompt_swallows_keys() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut panel = HandPanel::new(Topics::default(), publisher.clone());
        handle_key_input_events(key(KeyCode::Char('1')), &mut panel);
        assert!(matches!(panel.prompt(), Some(Prompt::Alert(_))));

        // q does not quit while the alert is open
        handle_key_input_events(key(KeyCode::Char('q')), &mut panel);
        assert!(panel.running);

        handle_key_input_events(key(KeyCode::Enter), &mut panel);
        assert!(panel.prompt().is_none());
        handle_key_input_events(key(KeyCode::Char('q')), &mut panel);
        assert!(!panel.running);
    }

    #[test]
    fn confirm_keys() {
        let (mut panel, publisher) = connected_panel();
        panel.handle_transport(TransportEvent::Closed, Instant::now());
        panel.handle_transport(TransportEvent::Connected, Instant::now());
        publisher.clear();

        handle_key_input_events(key(KeyCode::Char('2')), &mut panel);
        assert!(matches!(panel.prompt(), Some(Prompt::ConfirmBlind(_))));
        handle_key_input_events(key(KeyCode::Char('n')), &mut panel);
        assert!(publisher.published().is_empty());

        handle_key_input_events(key(KeyCode::Char('2')), &mut panel);
        handle_key_input_events(key(KeyCode::Char('y')), &mut panel);
        assert_eq!(
            publisher.published(),
            vec![("mao_robotica/servo2".to_string(), "1".to_string())]
        );
    }

    #[test]
    fn ctrl_c_always_quits() {
        let publisher = Arc::new(RecordingPublisher::default());
        let mut panel = HandPanel::new(Topics::default(), publisher);
        handle_key_input_events(key(KeyCode::Char('1')), &mut panel);
        handle_key_input_events(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            &mut panel,
        );
        assert!(!panel.running);
    }

    #[tokio::test(start_paused = true)]
    async fn decay_fires_while_no_event_arrives() {
        let (mut panel, _publisher) = connected_panel();
        let start = Instant::now();
        assert!(panel.device_online());

        step(&mut panel, std::future::pending::<HandPanelResult<Event>>())
            .await
            .expect("step");

        assert!(!panel.device_online());
        assert!(panel.liveness_deadline().is_none());
        assert!(Instant::now() - start >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn event_before_deadline_is_applied() {
        let (mut panel, publisher) = connected_panel();

        let next = async { Ok::<_, HandPanelError>(Event::Key(key(KeyCode::Char('a')))) };
        step(&mut panel, next).await.expect("step");

        assert!(panel.device_online());
        assert_eq!(
            publisher.published(),
            vec![("mao_robotica/todos".to_string(), "1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn closed_event_queue_is_an_error() {
        let (mut panel, _publisher) = connected_panel();
        let next = async { Err::<Event, _>(HandPanelError::EventError) };
        let res = step(&mut panel, next).await;
        assert!(matches!(res, Err(HandPanelError::EventError)));
    }
}
