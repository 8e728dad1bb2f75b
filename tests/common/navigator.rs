//! Navigator double that records redirects

use sharelink::Navigator;
use std::sync::{Arc, Mutex};

/// Navigator that stays on one location and records every `go_to`
pub struct RecordingNavigator {
    location: String,
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Navigator currently showing `location`
    pub fn at(location: &str) -> Arc<Self> {
        Arc::new(Self {
            location: location.to_string(),
            visits: Mutex::new(Vec::new()),
        })
    }

    /// Paths navigated to so far
    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn go_to(&self, path: &str) {
        self.visits.lock().unwrap().push(path.to_string());
    }
}
