//! User agent handling for HTTP requests.

pub const USER_AGENT: &str = "BowtieRiskAnalytics/0.1 (academic research)";

/// Resolve the user agent from an optional configured value.
///
/// Blank values fall back to the default research user agent.
pub fn resolve_user_agent(config: Option<&str>) -> String {
    match config.map(str::trim) {
        None | Some("") => USER_AGENT.to_string(),
        Some(custom) => custom.to_string(),
    }
}
