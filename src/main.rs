use anyhow::Result;
use teamcal_calendar::{CalendarFacade, SearchOverrides};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    teamcal_core::init()?;

    let (config, validation) = teamcal_core::Config::load_validated()?;
    if !validation.warnings.is_empty() {
        tracing::warn!(count = validation.warnings.len(), "Configuration loaded with warnings");
    }

    let facade = CalendarFacade::from_config(&config)
        .map_err(|e| anyhow::anyhow!("{}: {}", e.user_message(), e))?;

    tracing::info!("TeamCal started");

    // Optional free-text query from the command line
    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let overrides = (!query.is_empty()).then(|| SearchOverrides {
        query: Some(query),
        ..Default::default()
    });

    facade.load_events(overrides).await;

    let state = facade.state();
    let range = state.config.visible_range();

    println!("TeamCal - {} view", format!("{:?}", state.config.view).to_lowercase());
    println!(
        "Window: {} .. {}",
        range.start.format("%Y-%m-%d"),
        range.end.format("%Y-%m-%d")
    );

    if let Some(error) = &state.error {
        println!("\nError: {}", error);
        return Ok(());
    }

    let events = facade.visible_events();
    if events.is_empty() {
        println!("\nNo events.");
    }
    for event in &events {
        println!(
            "  {}  {:<40} [{} / {}]",
            event.start.format("%a %d %b %H:%M"),
            event.title,
            event.event_type.as_str(),
            event.priority.as_str()
        );
    }

    Ok(())
}
