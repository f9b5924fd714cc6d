use crate::pool::SourceUpdate;
use tokio::sync::mpsc;

/// Render one update as a single output line.
///
/// Plain mode prints `player: line`; JSON mode prints the whole view so
/// scripts can pick the fields they need.
pub fn format_update(update: &SourceUpdate, json: bool) -> Result<String, serde_json::Error> {
    if json {
        let mut value = serde_json::to_value(&update.view)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("player".to_string(), update.player.clone().into());
        }
        serde_json::to_string(&value)
    } else {
        Ok(format!("{}: {}", update.player, update.view.current_line))
    }
}

/// Print lyric updates to stdout until every listener has stopped.
pub async fn display_lyrics_pipe(
    mut rx: mpsc::Receiver<SourceUpdate>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    while let Some(update) = rx.recv().await {
        println!("{}", format_update(&update, json)?);
    }
    Ok(())
}
