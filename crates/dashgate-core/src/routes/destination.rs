use serde::Serialize;
use serde_json::Value;

use crate::api::{ApiClient, ApiError};

/// Login entry point
pub const LOGIN_PATH: &str = "/login";

/// Default protected landing view
pub const LANDING_PATH: &str = "/dashboard/home";

/// Every path at or below this root requires authentication
pub const PROTECTED_ROOT: &str = "/dashboard";

/// Normalize a navigation path: drop query and fragment, collapse repeated
/// and trailing slashes, always start with `/`.
pub fn normalize_path(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let segments: Vec<&str> = path[..end].split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Sections of the dashboard sidebar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum DashboardView {
    Home,
    Analytics,
    Calendar,
    Products,
    Users,
    Help,
    Settings,
    /// A path under the protected root that no section claims
    Unknown,
}

impl DashboardView {
    /// Sidebar order
    pub const ALL: [DashboardView; 7] = [
        DashboardView::Home,
        DashboardView::Analytics,
        DashboardView::Calendar,
        DashboardView::Products,
        DashboardView::Users,
        DashboardView::Help,
        DashboardView::Settings,
    ];

    /// Map the first segment below the protected root to a view.
    /// No segment means the index route, which is home.
    pub fn from_segment(segment: Option<&str>) -> Self {
        let Some(segment) = segment else {
            return DashboardView::Home;
        };
        match segment.to_ascii_lowercase().as_str() {
            "home" => DashboardView::Home,
            "analytics" => DashboardView::Analytics,
            "calendar" => DashboardView::Calendar,
            "products" => DashboardView::Products,
            "users" => DashboardView::Users,
            "help" => DashboardView::Help,
            "settings" => DashboardView::Settings,
            _ => DashboardView::Unknown,
        }
    }

    /// Get the display title for this view.
    pub fn title(&self) -> &'static str {
        match self {
            DashboardView::Home => "Dashboard",
            DashboardView::Analytics => "Analytics",
            DashboardView::Calendar => "Calendar",
            DashboardView::Products => "Products",
            DashboardView::Users => "Users",
            DashboardView::Help => "Help",
            DashboardView::Settings => "Settings",
            DashboardView::Unknown => "Not Found",
        }
    }

    /// Path segment below the protected root
    pub fn segment(&self) -> Option<&'static str> {
        match self {
            DashboardView::Home => Some("home"),
            DashboardView::Analytics => Some("analytics"),
            DashboardView::Calendar => Some("calendar"),
            DashboardView::Products => Some("products"),
            DashboardView::Users => Some("users"),
            DashboardView::Help => Some("help"),
            DashboardView::Settings => Some("settings"),
            DashboardView::Unknown => None,
        }
    }

    pub fn path(&self) -> Option<String> {
        self.segment().map(|s| format!("{}/{}", PROTECTED_ROOT, s))
    }

    /// Remote payloads the view displays. Calendar, help and settings are
    /// rendered from local data only.
    pub fn data_sources(&self) -> &'static [DataSource] {
        match self {
            DashboardView::Home => &[
                DataSource::Overview,
                DataSource::Analytics,
                DataSource::Users,
                DataSource::Products,
            ],
            DashboardView::Analytics => &[DataSource::Analytics],
            DashboardView::Products => &[DataSource::Products],
            DashboardView::Users => &[DataSource::Users],
            DashboardView::Calendar
            | DashboardView::Help
            | DashboardView::Settings
            | DashboardView::Unknown => &[],
        }
    }
}

/// Read-only endpoints behind the protected views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataSource {
    Overview,
    Analytics,
    Users,
    Products,
}

impl DataSource {
    pub fn name(&self) -> &'static str {
        match self {
            DataSource::Overview => "overview",
            DataSource::Analytics => "analytics",
            DataSource::Users => "users",
            DataSource::Products => "products",
        }
    }

    pub async fn fetch(self, client: &ApiClient) -> Result<Value, ApiError> {
        match self {
            DataSource::Overview => client.fetch_overview().await,
            DataSource::Analytics => client.fetch_analytics().await,
            DataSource::Users => client.fetch_users().await,
            DataSource::Products => client.fetch_products().await,
        }
    }
}

/// Where a navigation path leads, as far as the guard is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub enum Destination {
    /// The login entry point
    Login,
    /// A view under the protected root
    Protected(DashboardView),
    /// Anything else. The catch-all route shows the login screen.
    Fallback,
}

impl Destination {
    /// Classify a normalized path against the given login path and protected root.
    pub fn classify(path: &str, login_path: &str, protected_root: &str) -> Self {
        if Self::same_segments(segments(path), segments(login_path)) {
            return Destination::Login;
        }

        let mut path_segments = segments(path);
        for root in segments(protected_root) {
            match path_segments.next() {
                Some(segment) if segment.eq_ignore_ascii_case(root) => {}
                _ => return Destination::Fallback,
            }
        }
        Destination::Protected(DashboardView::from_segment(path_segments.next()))
    }

    fn same_segments<'a, 'b>(
        mut left: impl Iterator<Item = &'a str>,
        mut right: impl Iterator<Item = &'b str>,
    ) -> bool {
        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => {}
                _ => return false,
            }
        }
    }
}
