use tokio::sync::watch;

/// Broadcasts a single shutdown request to every listener, for example when the operator hits
/// Ctrl-C while a run is in progress.
///
/// Unlike a broadcast channel, a listener created after [`ShutdownHandle::shutdown`] was called
/// still observes the request.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: watch::channel(false).0,
        }
    }

    pub fn shutdown(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    /// Request shutdown when the process receives Ctrl-C.
    pub fn shutdown_on_ctrl_c(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::warn!("Received Ctrl-C, stopping the current run");
                    handle.shutdown();
                }
                Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Point in time check of whether shutdown has been requested.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until shutdown is requested. Safe to race against other futures.
    ///
    /// If every [`ShutdownHandle`] is dropped without requesting shutdown, this never resolves.
    pub async fn wait_for_shutdown(&mut self) {
        if self.receiver.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
