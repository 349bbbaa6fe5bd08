//! hmmviz demo
//!
//! Simulate a training run, stream it into a diagram while it plays, then
//! write the final frame to disk.
//!
//! Usage: `hmmviz [states] [observations] [iterations] [out_dir]`

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use hmmviz_vis::{
    Diagram, DiagramSettings, OutputFormat, SimulationConfig, StaticOverrides, Surface,
    TrainingSimulation,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hmmviz=info,hmmviz_vis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let defaults = SimulationConfig::default();
    let config = SimulationConfig {
        states: args.get(1).and_then(|s| s.parse().ok()).unwrap_or(defaults.states),
        observations: args.get(2).and_then(|s| s.parse().ok()).unwrap_or(defaults.observations),
        iterations: args.get(3).and_then(|s| s.parse().ok()).unwrap_or(defaults.iterations),
        seed: defaults.seed,
    }
    .clamped();
    let out_dir = args.get(4).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    println!("hmmviz");
    println!("======");
    println!();
    println!(
        "Simulating {} iterations: {} states, {} observations",
        config.iterations, config.states, config.observations
    );

    let settings = DiagramSettings::default();
    let feed_every = Duration::from_millis(settings.iteration_interval_ms / 2);
    let diagram = Diagram::new(Surface::default(), settings)?;

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    diagram.on_complete(move |completion| {
        let _ = done_tx.send(*completion);
    });
    diagram.start()?;

    let total = config.iterations as usize;
    for (k, snapshot) in TrainingSimulation::new(config).enumerate() {
        diagram.feed_iteration(snapshot)?;
        if k == 0 {
            diagram.play();
        }
        tokio::time::sleep(feed_every).await;
    }

    // Playback may catch up with the feed and complete early; wait for the
    // completion at the last iteration.
    while let Some(completion) = done_rx.recv().await {
        tracing::info!(iteration = completion.iteration, "completion");
        if completion.index + 1 >= total {
            break;
        }
    }

    let status = diagram.status();
    println!();
    println!("Playback complete:");
    println!("  Iterations: {}", status.playback.total);
    if let Some(ll) = status.log_likelihood {
        println!("  Final log-likelihood: {ll:.4}");
    }

    std::fs::create_dir_all(&out_dir)?;
    let svg = out_dir.join("diagram.svg");
    diagram.save(&svg, OutputFormat::Svg)?;
    println!("  Wrote {}", svg.display());

    if cfg!(feature = "png") {
        let png = out_dir.join("diagram.png");
        diagram.save(&png, OutputFormat::Png)?;
        println!("  Wrote {}", png.display());
    }

    let dot = out_dir.join("static.dot");
    std::fs::write(&dot, diagram.static_graph(&StaticOverrides::default())?.to_dot())?;
    println!("  Wrote {}", dot.display());

    diagram.destroy();
    Ok(())
}
