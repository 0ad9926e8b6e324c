use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative shutdown handle shared by the dispatcher, the consumer and
/// the hosting process. `stop` is idempotent; observers see the transition
/// through `stopped`.
#[derive(Clone)]
pub struct AppLifetime {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl AppLifetime {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        AppLifetime { tx: Arc::new(tx), rx }
    }

    /// Requests shutdown of everything observing this handle.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `stop` has been called, immediately if it already was.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for AppLifetime {
    fn default() -> Self {
        AppLifetime::new()
    }
}
