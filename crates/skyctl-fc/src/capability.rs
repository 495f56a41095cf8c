use tokio::sync::watch;
use tracing::debug;

/// Client-facing wrapper around one capability's observable state.
///
/// Engines mutate the state through its fluent `update_*` methods and call
/// [`Component::notify_updated`] once per burst; observers only see a new
/// snapshot when something actually changed.
pub struct Component<S> {
    name: &'static str,
    state: S,
    last_sent: Option<S>,
    published: bool,
    changes: u64,
    tx: watch::Sender<Option<S>>,
}

impl<S: Clone + PartialEq> Component<S> {
    pub fn new(name: &'static str, state: S) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { name, state, last_sent: None, published: false, changes: 0, tx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    /// Number of snapshots delivered to observers so far.
    pub fn change_count(&self) -> u64 {
        self.changes
    }

    pub fn publish(&mut self) {
        if self.published {
            return;
        }
        debug!("{} published", self.name);
        self.published = true;
        self.send();
    }

    pub fn unpublish(&mut self) {
        if !self.published {
            return;
        }
        debug!("{} unpublished", self.name);
        self.published = false;
        self.last_sent = None;
        self.changes += 1;
        self.tx.send_replace(None);
    }

    pub fn notify_updated(&mut self) {
        if !self.published || self.last_sent.as_ref() == Some(&self.state) {
            return;
        }
        self.send();
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<S>> {
        self.tx.subscribe()
    }

    fn send(&mut self) {
        self.last_sent = Some(self.state.clone());
        self.changes += 1;
        self.tx.send_replace(Some(self.state.clone()));
    }
}
