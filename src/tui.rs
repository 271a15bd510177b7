use crate::app::{Action, App, Command, Message};
use crate::fetch::{spawn_open_url, Fetcher};
use crate::ui::ui;
use chrono::Local;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, error, info};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::thread;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{self, Duration};

const TICK_INTERVAL: Duration = Duration::from_secs(60);

pub fn map_key(key: KeyEvent) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => Action::Quit,
        KeyCode::Char('u') if ctrl => Action::ScrollUp,
        KeyCode::Char('d') if ctrl => Action::ScrollDown,
        KeyCode::PageUp => Action::ScrollUp,
        KeyCode::PageDown => Action::ScrollDown,
        KeyCode::Up | KeyCode::Char('k') => Action::SelectPrevious,
        KeyCode::Down | KeyCode::Char('j') => Action::SelectNext,
        KeyCode::Right | KeyCode::Char('l') => Action::NextDay,
        KeyCode::Left | KeyCode::Char('h') => Action::PreviousDay,
        KeyCode::Char('t') => Action::Today,
        KeyCode::Tab => Action::ToggleFocus,
        KeyCode::Char('r') => Action::Refresh,
        KeyCode::Enter => Action::OpenMeeting,
        KeyCode::Char('v') => Action::OpenEvent,
        KeyCode::Char('?') => Action::ToggleHelp,
        KeyCode::Char('q') => Action::Quit,
        _ => Action::Unbound,
    }
}

/// crossterm reads block, so they get a thread of their own.
fn spawn_input_thread(tx: UnboundedSender<Message>) {
    thread::spawn(move || loop {
        let message = match event::read() {
            Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => Message::Input(map_key(key)),
            Ok(CEvent::Resize(width, height)) => Message::Resize { width, height },
            Ok(_) => continue,
            Err(e) => {
                error!("Terminal input failed: {}", e);
                break;
            }
        };
        if tx.send(message).is_err() {
            break;
        }
    });
}

fn spawn_tick_task(tx: UnboundedSender<Message>) {
    tokio::spawn(async move {
        let mut interval = time::interval(TICK_INTERVAL);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            debug!("Tick");
            if tx.send(Message::Tick).is_err() {
                break;
            }
        }
    });
}

/// Runs a command. Returns `false` once the app should stop.
fn execute(command: Command, fetcher: &Fetcher, tx: &UnboundedSender<Message>) -> bool {
    match command {
        Command::None => true,
        Command::Fetch(request) => {
            fetcher.spawn(request, tx.clone());
            true
        }
        Command::OpenUrl(url) => {
            spawn_open_url(url);
            true
        }
        Command::Quit => false,
    }
}

/// The main application loop: draw, wait for the next message, update.
pub async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: App,
    fetcher: Fetcher,
) -> io::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_input_thread(tx.clone());
    spawn_tick_task(tx.clone());

    let size = terminal.size()?;
    let (app, _) = app.update(
        Message::Resize {
            width: size.width,
            height: size.height,
        },
        Local::now(),
    );
    let (mut app, command) = app.init();
    execute(command, &fetcher, &tx);

    loop {
        terminal.draw(|f| ui(f, &app))?;

        let Some(message) = rx.recv().await else {
            break;
        };
        let (next, command) = app.update(message, Local::now());
        app = next;
        if !execute(command, &fetcher, &tx) {
            break;
        }
    }

    info!("Leaving main loop.");
    Ok(())
}
