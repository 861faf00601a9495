use parking_lot::Mutex;

/// Where the application currently is, and how to move it.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    /// In-app transition; view state is kept.
    fn navigate(&self, path: &str);
    /// Full reload: all view state built under the previous session is dropped.
    fn reload_to(&self, path: &str);
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<String>,
    reloads: usize,
}

/// In-memory navigator used by the shell and by tests.
#[derive(Debug)]
pub struct HistoryNavigator {
    inner: Mutex<History>,
}

impl HistoryNavigator {
    pub fn new(start: &str) -> Self {
        Self { inner: Mutex::new(History { entries: vec![start.to_string()], reloads: 0 }) }
    }

    pub fn reload_count(&self) -> usize { self.inner.lock().reloads }

    /// Paths visited since the last reload, oldest first.
    pub fn history(&self) -> Vec<String> { self.inner.lock().entries.clone() }
}

impl Navigator for HistoryNavigator {
    fn current_path(&self) -> String {
        self.inner.lock().entries.last().cloned().unwrap_or_else(|| "/".to_string())
    }

    fn navigate(&self, path: &str) {
        self.inner.lock().entries.push(path.to_string());
    }

    fn reload_to(&self, path: &str) {
        let mut h = self.inner.lock();
        h.entries.clear();
        h.entries.push(path.to_string());
        h.reloads += 1;
    }
}
