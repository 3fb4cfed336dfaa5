use std::fmt;

/// Screens reachable from the shell, addressed by URL fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Today,
    Add,
    History,
    Entry(String),
    Settings,
    Activities,
    /// `None` is the new-activity form.
    Activity(Option<String>),
    Meditation,
}

impl Route {
    /// Parses `#/history`, `history` or `/entry/abc`. Unknown fragments land on today.
    pub fn parse(fragment: &str) -> Self {
        let path = fragment.trim_start_matches('#').trim_matches('/');
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };

        match (head, rest) {
            ("add", None) => Route::Add,
            ("history", None) => Route::History,
            ("settings", None) => Route::Settings,
            ("activities", None) => Route::Activities,
            ("meditation", None) => Route::Meditation,
            ("entry", Some(id)) if is_segment(id) => Route::Entry(id.to_string()),
            ("activity", Some("new")) => Route::Activity(None),
            ("activity", Some(id)) if is_segment(id) => Route::Activity(Some(id.to_string())),
            _ => Route::Today,
        }
    }

    pub fn href(&self) -> String {
        format!("#/{self}")
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Today => "Today",
            Route::Add => "Add entry",
            Route::History => "History",
            Route::Entry(_) => "Entry",
            Route::Settings => "Settings",
            Route::Activities => "Activities",
            Route::Activity(None) => "New activity",
            Route::Activity(Some(_)) => "Edit activity",
            Route::Meditation => "Meditation",
        }
    }

    /// Tabs shown in the navigation. Only screens the shell renders get one.
    pub fn tabs() -> [Route; 3] {
        [Route::Today, Route::History, Route::Meditation]
    }
}

fn is_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains('/')
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Today => f.write_str("today"),
            Route::Add => f.write_str("add"),
            Route::History => f.write_str("history"),
            Route::Entry(id) => write!(f, "entry/{id}"),
            Route::Settings => f.write_str("settings"),
            Route::Activities => f.write_str("activities"),
            Route::Activity(None) => f.write_str("activity/new"),
            Route::Activity(Some(id)) => write!(f, "activity/{id}"),
            Route::Meditation => f.write_str("meditation"),
        }
    }
}
