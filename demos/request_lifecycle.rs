//! Request Lifecycle Example
//!
//! Simulates two requests from the same browser: the first one decides
//! participation and sets the cookie, the second one reads it back.

use armature_ab::ChooserConfig;
use armature_ab::prelude::*;
use armature_experiments_analytics::{
    EXPERIMENT_ID, GoogleCollector, GoogleUniversalAnalytics, ScriptRenderer,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn experiments() -> Result<Vec<Experiment>, ExperimentError> {
    Ok(vec![
        Experiment::new("checkout")?
            .with_variants(vec![
                Variant::callback("one-page", || println!("   🛒 Rendering one-page checkout")),
                Variant::callback("wizard", || println!("   🧙 Rendering checkout wizard")),
            ])?
            .with_option(EXPERIMENT_ID, "EXP_CHECKOUT"),
        Experiment::new("headline")?
            .with_variants(vec![Variant::simple("short"), Variant::simple("long")])?
            .with_option(EXPERIMENT_ID, "EXP_HEADLINE"),
    ])
}

/// Handle one request and return the `Set-Cookie` value to send back
fn handle_request(
    config: &ExperimentsConfig,
    cookie_header: Option<&str>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let storage = CookieStorage::from_request(config.cookie.clone(), cookie_header)?;
    let collector = Arc::new(GoogleCollector::new());

    let dispatcher = config.event_dispatcher();
    dispatcher.add_subscriber(collector.clone());
    dispatcher.add_listener(ParticipationEvent::BLOCK, |event| {
        println!(
            "   🚫 Not participating in '{}'",
            event.registration().experiment().id()
        );
        Ok(())
    });

    let mut engine = Engine::from_config(
        config,
        ParticipationManager::new(storage),
        Arc::new(dispatcher),
    )?;
    for experiment in experiments()? {
        engine.add_test(experiment)?;
    }

    for decision in engine.start()? {
        println!("   {:?}", decision);
    }

    let script = GoogleUniversalAnalytics::from(collector.as_ref())
        .with_api_client(true)
        .script();
    if !script.is_empty() {
        println!("\n{}\n", script);
    }

    let set_cookie = engine.manager().storage().take_set_cookie_header();
    engine.manager().storage().mark_headers_sent();
    Ok(set_cookie)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("\n=== Request Lifecycle Example ===\n");

    let mut config = ExperimentsConfig::from_env()?;
    config.default_percentage.get_or_insert(80);
    config.default_chooser.get_or_insert(ChooserConfig::Random);

    println!("1. First visit:");
    let set_cookie = handle_request(&config, Some("session=abc"))?;
    let cookie = set_cookie
        .as_deref()
        .and_then(|header| header.split(';').next())
        .map(str::to_string);
    println!("   🍪 Set-Cookie: {}", set_cookie.as_deref().unwrap_or("-"));

    println!("\n2. Returning visit:");
    let set_cookie = handle_request(&config, cookie.as_deref())?;
    println!(
        "   🍪 Set-Cookie: {}",
        set_cookie.as_deref().unwrap_or("(unchanged)")
    );

    println!("\n=== Example Complete ===\n");
    Ok(())
}
