//! Single-owner serialized components. Each actor exclusively owns its
//! state (watch handles, the one-time prompt flag, the resolved tool cache)
//! and talks to the rest of the system over channels only.

pub mod space_monitor;
pub mod space_switcher;

pub type Sender<T> = tokio::sync::mpsc::UnboundedSender<T>;
pub type Receiver<T> = tokio::sync::mpsc::UnboundedReceiver<T>;

pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    tokio::sync::mpsc::unbounded_channel()
}
