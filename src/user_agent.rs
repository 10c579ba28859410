//! User-Agent strings for outbound HTTP that is not driven by the browser.

/// User-Agent for source reachability probes.
///
/// Some dataset portals answer non-browser agents with 403, so the probe
/// presents a desktop browser string and appends the tool name.
#[must_use]
pub(crate) fn default_probe_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 rescue/{version}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_user_agent_carries_version() {
        let ua = default_probe_user_agent();
        assert!(ua.starts_with("Mozilla/5.0"));
        assert!(ua.ends_with(&format!("rescue/{}", env!("CARGO_PKG_VERSION"))));
    }
}
