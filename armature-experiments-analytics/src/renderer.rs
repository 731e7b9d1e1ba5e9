//! Google Analytics script renderers
//!
//! Renderers turn the participations gathered by a
//! [`GoogleCollector`](crate::GoogleCollector) into a `<script>` block that
//! reports the chosen variations to Google Content Experiments.

use crate::collector::GoogleCollector;

/// Script include for the Content Experiments API client
pub const API_CLIENT_SCRIPT: &str = r#"<script src="//www.google-analytics.com/cx/api.js"></script>"#;

/// Default event category reported to Google Analytics
pub const DEFAULT_EVENT_CATEGORY: &str = "ArmatureAb";

/// Renders participations as an HTML script block.
pub trait ScriptRenderer {
    /// Participations as experiment id → variation index
    fn participations(&self) -> &[(String, usize)];

    /// The rendered script; empty when there are no participations
    fn script(&self) -> String;
}

#[derive(Debug, Clone)]
struct GoogleScript {
    participations: Vec<(String, usize)>,
    api_client: bool,
    category: String,
}

impl GoogleScript {
    fn new<I, K>(participations: I) -> Self
    where
        I: IntoIterator<Item = (K, usize)>,
        K: Into<String>,
    {
        Self {
            participations: participations
                .into_iter()
                .map(|(id, index)| (id.into(), index))
                .collect(),
            api_client: false,
            category: DEFAULT_EVENT_CATEGORY.to_string(),
        }
    }

    fn render(&self, track: impl Fn(&str, &str) -> String) -> String {
        if self.participations.is_empty() {
            return String::new();
        }

        let category = escape(&self.category);
        let mut script = Vec::with_capacity(self.participations.len() + 3);
        if self.api_client {
            script.push(API_CLIENT_SCRIPT.to_string());
        }
        script.push("<script>".to_string());

        for (id, index) in &self.participations {
            let id = escape(id);
            script.push(format!(
                "(function(){{\n    ga(function(tracker) {{\n        cxApi.setChosenVariation({}, '{}');\n        {}\n    }});\n}})();",
                index,
                id,
                track(&id, &category)
            ));
        }

        script.push("</script>".to_string());
        script.join("\n")
    }
}

/// Escape a value for a single-quoted JavaScript string inside `<script>`
fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '<' => escaped.push_str("\\x3C"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

macro_rules! google_renderer {
    ($name:ident) => {
        impl $name {
            pub fn new<I, K>(participations: I) -> Self
            where
                I: IntoIterator<Item = (K, usize)>,
                K: Into<String>,
            {
                Self {
                    inner: GoogleScript::new(participations),
                }
            }

            /// Prefix the script with the Content Experiments API client
            pub fn with_api_client(mut self, include: bool) -> Self {
                self.inner.api_client = include;
                self
            }

            /// Event category reported with each participation
            pub fn with_category(mut self, category: impl Into<String>) -> Self {
                self.inner.category = category.into();
                self
            }

            pub fn includes_api_client(&self) -> bool {
                self.inner.api_client
            }

            pub fn category(&self) -> &str {
                &self.inner.category
            }
        }

        impl From<&GoogleCollector> for $name {
            fn from(collector: &GoogleCollector) -> Self {
                Self::new(collector.tests_data())
            }
        }
    };
}

/// Renderer for the classic `ga.js` tracker (`_gaq`).
///
/// # Examples
///
/// ```
/// use armature_experiments_analytics::{GoogleClassicAnalytics, ScriptRenderer};
///
/// let renderer = GoogleClassicAnalytics::new([("EXP_1", 1)]);
/// assert!(renderer.script().contains("_gaq.push(['_trackEvent', 'ArmatureAb', 'testRun', 'EXP_1', 1]);"));
/// ```
#[derive(Debug, Clone)]
pub struct GoogleClassicAnalytics {
    inner: GoogleScript,
}

google_renderer!(GoogleClassicAnalytics);

impl ScriptRenderer for GoogleClassicAnalytics {
    fn participations(&self) -> &[(String, usize)] {
        &self.inner.participations
    }

    fn script(&self) -> String {
        self.inner.render(|id, category| {
            format!(
                "_gaq.push(['_trackEvent', '{}', 'testRun', '{}', 1]);",
                category, id
            )
        })
    }
}

/// Renderer for the Universal Analytics tracker (`analytics.js`).
///
/// # Examples
///
/// ```
/// use armature_experiments_analytics::{GoogleUniversalAnalytics, ScriptRenderer};
///
/// let renderer = GoogleUniversalAnalytics::new(Vec::<(String, usize)>::new());
/// assert_eq!(renderer.script(), "");
/// ```
#[derive(Debug, Clone)]
pub struct GoogleUniversalAnalytics {
    inner: GoogleScript,
}

google_renderer!(GoogleUniversalAnalytics);

impl ScriptRenderer for GoogleUniversalAnalytics {
    fn participations(&self) -> &[(String, usize)] {
        &self.inner.participations
    }

    fn script(&self) -> String {
        self.inner.render(|id, category| {
            format!(
                "tracker.send('event', '{}', '{}', {{'nonInteraction': 1}});",
                category, id
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participations() -> Vec<(&'static str, usize)> {
        vec![("walter", 1), ("bernard", 0)]
    }

    #[test]
    fn test_universal_script() {
        let script = GoogleUniversalAnalytics::new(participations()).script();

        assert_eq!(
            script,
            "<script>
(function(){
    ga(function(tracker) {
        cxApi.setChosenVariation(1, 'walter');
        tracker.send('event', 'ArmatureAb', 'walter', {'nonInteraction': 1});
    });
})();
(function(){
    ga(function(tracker) {
        cxApi.setChosenVariation(0, 'bernard');
        tracker.send('event', 'ArmatureAb', 'bernard', {'nonInteraction': 1});
    });
})();
</script>"
        );
    }

    #[test]
    fn test_universal_script_with_api_client() {
        let script = GoogleUniversalAnalytics::new(participations())
            .with_api_client(true)
            .script();

        assert!(script.starts_with(
            "<script src=\"//www.google-analytics.com/cx/api.js\"></script>\n<script>\n"
        ));
        assert!(script.ends_with("})();\n</script>"));
    }

    #[test]
    fn test_classic_script() {
        let script = GoogleClassicAnalytics::new(participations()).script();

        assert_eq!(
            script,
            "<script>
(function(){
    ga(function(tracker) {
        cxApi.setChosenVariation(1, 'walter');
        _gaq.push(['_trackEvent', 'ArmatureAb', 'testRun', 'walter', 1]);
    });
})();
(function(){
    ga(function(tracker) {
        cxApi.setChosenVariation(0, 'bernard');
        _gaq.push(['_trackEvent', 'ArmatureAb', 'testRun', 'bernard', 1]);
    });
})();
</script>"
        );
    }

    #[test]
    fn test_empty_participations_render_nothing() {
        let empty: Vec<(String, usize)> = Vec::new();
        assert_eq!(GoogleClassicAnalytics::new(empty.clone()).script(), "");
        assert_eq!(
            GoogleUniversalAnalytics::new(empty)
                .with_api_client(true)
                .script(),
            ""
        );
    }

    #[test]
    fn test_participations_are_kept_in_order() {
        let renderer = GoogleUniversalAnalytics::new(participations());
        assert_eq!(
            renderer.participations(),
            &[("walter".to_string(), 1), ("bernard".to_string(), 0)]
        );
    }

    #[test]
    fn test_custom_category() {
        let renderer = GoogleClassicAnalytics::new([("t1", 0)]).with_category("Checkout");
        assert_eq!(renderer.category(), "Checkout");
        assert!(
            renderer
                .script()
                .contains("['_trackEvent', 'Checkout', 'testRun', 't1', 1]")
        );
    }

    #[test]
    fn test_identifiers_are_escaped() {
        let script = GoogleUniversalAnalytics::new([("it's</script>", 0)]).script();
        assert!(script.contains("'it\\'s\\x3C/script>'"));
        assert_eq!(script.matches("</script>").count(), 1);
    }

    #[test]
    fn test_from_collector() {
        let collector = GoogleCollector::new();
        collector.add_participation("EXP_1", 2);

        let renderer = GoogleUniversalAnalytics::from(&collector);
        assert_eq!(renderer.participations(), &[("EXP_1".to_string(), 2)]);
        assert!(!renderer.includes_api_client());
    }
}
