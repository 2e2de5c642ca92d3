use std::env;

use anyhow::Context;
use log::info;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use gradient_canvas::{SceneConfig, TickDriver};

const PROGRESS_EVERY: usize = 500;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .context("usage: gradient-canvas <scene.json>")?;
    let scene = SceneConfig::load(&path).with_context(|| format!("failed to load {path}"))?;

    let mut session = scene.session();
    let run = session.start(&scene.training)?;

    let token = CancellationToken::new();
    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received SIGINT");
            ctrl_c.cancel();
        }
    });

    let driver = TickDriver::new(scene.tick_interval());
    let summary = driver
        .run(&mut session, run, &token, |report| {
            if report.iteration % PROGRESS_EVERY == 0 {
                info!(
                    "iteration {}: cost {}, {} left",
                    report.iteration, report.cost, report.iterations_left
                );
            }
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
