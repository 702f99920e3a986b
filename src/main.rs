//! Suika3D entry point
//!
//! The native build runs a headless autoplay session: it drops a ball every
//! second while sweeping the drop point around the jar, and reports merges
//! and the final score. Usage: `suika3d [seed] [config.json]`.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use suika3d::GameConfig;
    use suika3d::consts::SIM_DT;
    use suika3d::sim::{Session, Spawner};

    /// Ten minutes of simulated play at most
    const MAX_FRAMES: u32 = 60 * 600;
    /// Frames between drops
    const DROP_INTERVAL: u32 = 60;

    suika3d::platform::init_logging();
    log::info!("Suika3D (native) starting...");

    let mut args = std::env::args().skip(1);
    let seed = args.next();
    let config = match args.next() {
        Some(path) => match GameConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Could not load config {path}: {e}");
                std::process::exit(1);
            }
        },
        None => GameConfig::default(),
    };

    let spawner = match &seed {
        Some(text) => Spawner::from_seed_str(text, &config),
        None => Spawner::new(None, &config),
    };
    let mut session = match Session::with_spawner(config, spawner) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Invalid config: {e}");
            std::process::exit(1);
        }
    };
    log::info!("Autoplay with seed {}", session.spawner().seed());

    let mut drops = 0u32;
    let mut merges = 0usize;
    for frame in 0..MAX_FRAMES {
        if frame % DROP_INTERVAL == 0 {
            // Golden-angle sweep keeps drops spread over the disk
            let angle = drops as f32 * 2.399_963;
            let reach = session.spawner().limit() * ((drops % 5) as f32 / 4.0);
            session.set_drop_position(reach * angle.cos(), reach * angle.sin());
            if session.drop_current().is_some() {
                drops += 1;
            }
        }

        let report = session.frame(SIM_DT);
        for applied in &report.merges {
            log::info!(
                "Merge {} -> {} (+{})",
                applied.event.source_tier,
                applied.event.result_tier,
                applied.event.score
            );
        }
        merges += report.merges.len();
        if report.game_over {
            break;
        }
    }

    println!(
        "seed {} | {} drops | {} merges | {} balls | score {} | {:?}",
        session.spawner().seed(),
        drops,
        merges,
        session.world().ball_count(),
        session.score(),
        session.phase()
    );
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The browser front end drives `Session` directly; nothing to run here
}
