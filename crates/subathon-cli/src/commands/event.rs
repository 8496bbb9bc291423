use subathon_core::router;
use subathon_core::timer::now_ms;
use subathon_core::InboundEvent;

use super::timer::StoredTimer;

/// Normalize one raw envelope and apply it to the persisted timer.
pub fn run(json: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw: serde_json::Value = serde_json::from_str(json)?;
    let Some(event) = InboundEvent::normalize(&raw) else {
        tracing::info!("event not recognised, nothing to do");
        return Ok(());
    };

    let now = now_ms();
    let mut timer = StoredTimer::open(now)?;
    let ticked = timer.engine.tick(now);
    if let Some(event) = &ticked {
        tracing::info!(?event, "stored timer caught up");
    }

    let handled = router::handle(&mut timer.engine, &timer.config, &event, now);
    println!("{}", serde_json::to_string_pretty(&handled)?);

    if ticked.is_some() || handled.is_mutation() {
        timer.save()?;
    }
    Ok(())
}
