use serde::{Deserialize, Serialize};

/// Route-level access rules for the client surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteRules {
    /// Paths under this prefix are never intercepted.
    pub api_auth_prefix: String,
    /// Pages only meaningful while signed out.
    pub auth_routes: Vec<String>,
    /// Pages that require a session.
    pub protected_routes: Vec<String>,
    pub login_route: String,
    pub home_route: String,
}

impl Default for RouteRules {
    fn default() -> Self {
        Self {
            api_auth_prefix: "/api/auth".to_string(),
            auth_routes: vec!["/login".to_string()],
            protected_routes: vec!["/user".to_string()],
            login_route: "/login".to_string(),
            home_route: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(String),
}

impl RouteRules {
    /// Decide whether `path` may be entered given whether a session cookie is held.
    pub fn evaluate(&self, path: &str, authenticated: bool) -> RouteDecision {
        if path.starts_with(&self.api_auth_prefix) {
            return RouteDecision::Allow;
        }

        if self.auth_routes.iter().any(|r| path.starts_with(r.as_str())) {
            if authenticated {
                return RouteDecision::Redirect(self.home_route.clone());
            }
            return RouteDecision::Allow;
        }

        if !authenticated && self.protected_routes.iter().any(|r| path.starts_with(r.as_str())) {
            return RouteDecision::Redirect(self.login_route.clone());
        }

        RouteDecision::Allow
    }
}

/// The pages a user can land on from the home screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Chat,
    Upload,
}

impl Surface {
    /// Signed-in users get the per-user variant of each page.
    pub fn route(self, authenticated: bool) -> &'static str {
        match (self, authenticated) {
            (Surface::Chat, true) => "/user/chat",
            (Surface::Chat, false) => "/chat",
            (Surface::Upload, true) => "/user/upload",
            (Surface::Upload, false) => "/upload",
        }
    }
}
