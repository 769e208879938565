use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use anyhow::Result;
use rdev::{listen, Event, EventType};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

use super::{InputSource, RawInputEvent};

type SharedSender = Arc<Mutex<Option<UnboundedSender<RawInputEvent>>>>;

/// Global keyboard and mouse hook backed by `rdev`. The listener runs on its own thread, which
/// is the capture context; events are handed off through the channel given to
/// [InputSource::start].
///
/// `rdev::listen` can't be cancelled, so stopping only detaches the channel. A later start
/// reattaches to the already running thread. If the listener fails the channel is closed, so
/// the consumer sees capture going away.
pub struct RdevInputSource {
    sender: SharedSender,
    listening: Arc<AtomicBool>,
}

impl RdevInputSource {
    pub fn new() -> Self {
        Self {
            sender: Arc::new(Mutex::new(None)),
            listening: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for RdevInputSource {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(sender: &SharedSender) {
    if let Ok(mut current) = sender.lock() {
        current.take();
    }
}

fn listener_failed(sender: &SharedSender, listening: &AtomicBool) {
    listening.store(false, Ordering::SeqCst);
    detach(sender);
}

fn translate(event: &Event) -> Option<RawInputEvent> {
    match event.event_type {
        EventType::KeyPress(_) => Some(RawInputEvent::KeyDown),
        EventType::MouseMove { x, y } => Some(RawInputEvent::CursorSample { x, y }),
        _ => None,
    }
}

impl InputSource for RdevInputSource {
    fn is_permitted(&self) -> bool {
        // rdev has no preflight check. On macOS the listener silently receives nothing until
        // input monitoring is granted.
        true
    }

    fn request_permission(&mut self) {
        info!("Input monitoring permission is managed by the operating system settings");
    }

    fn start(&mut self, sender: UnboundedSender<RawInputEvent>) -> Result<()> {
        if let Ok(mut current) = self.sender.lock() {
            *current = Some(sender);
        }

        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let shared = self.sender.clone();
        let on_failure = self.sender.clone();
        let listening = self.listening.clone();
        thread::Builder::new()
            .name("input-capture".into())
            .spawn(move || {
                let callback = move |event: Event| {
                    let Some(raw) = translate(&event) else {
                        return;
                    };
                    if let Ok(sender) = shared.lock() {
                        if let Some(sender) = sender.as_ref() {
                            // The consumer went away, nothing to deliver to.
                            let _ = sender.send(raw);
                        }
                    }
                };
                if let Err(e) = listen(callback) {
                    error!("Input listener stopped {e:?}");
                    listener_failed(&on_failure, &listening);
                }
            })
            .inspect_err(|_| self.listening.store(false, Ordering::SeqCst))?;
        info!("Started input capture thread");
        Ok(())
    }

    fn stop(&mut self) {
        detach(&self.sender);
    }
}
