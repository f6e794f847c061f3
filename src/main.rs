//! TerraHub host runner.
//!
//! Drives the controller against a simulated node chain.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Adapters (outer ring)                    │
//! │                                                              │
//! │  VirtualChain     LogEventSink   MemoryStore /   ManualClock │
//! │  (Bus)            (EventSink)    JsonFileStore   (Clock)     │
//! │                                  (ConfigPort)                │
//! │  ────────────────── Port Trait Boundary ─────────────────    │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │         ControllerService (rules · schedules)          │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};

use terrahub::adapters::log_sink::LogEventSink;
use terrahub::adapters::store::{JsonFileStore, MemoryStore};
use terrahub::adapters::time::{ManualClock, SystemClock};
use terrahub::app::ports::{Clock, ConfigPort};
use terrahub::app::service::ControllerService;
use terrahub::config::{ControllerConfig, NodeConfig};
use terrahub::protocol::{CONTROLLER_NODE_ID, NodeClient};
use terrahub::protocol::payload::{PortType, SensorType};
use terrahub::rules::{ComparisonOperator, Rule, RuleAction, RuleCondition};
use terrahub::sim::VirtualChain;

#[derive(Debug, Parser)]
#[command(name = "terrahub", version, about = "Environmental controller running against a simulated node chain")]
struct Args {
    /// Configuration file (JSON).  Created with the demo setup if missing.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Expansion nodes behind the controller.
    #[arg(long, default_value_t = 2)]
    nodes: usize,

    /// Cycles to run; 0 runs until interrupted.
    #[arg(long, default_value_t = 120)]
    cycles: u64,

    /// Real time between cycles.  Simulated time always advances by the
    /// configured poll interval.
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("╔══════════════════════════════════════╗");
    info!("║  TerraHub v{:<26}║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    match &args.config {
        Some(path) => {
            let store = JsonFileStore::new(path);
            let config = if path.exists() {
                store
                    .load()
                    .with_context(|| format!("loading {}", path.display()))?
            } else {
                let config = demo_config(args.nodes);
                store
                    .save(&config)
                    .with_context(|| format!("writing {}", path.display()))?;
                config
            };
            run(&args, config, &store)
        }
        None => run(&args, demo_config(args.nodes), &MemoryStore::new()),
    }
}

fn run(args: &Args, config: ControllerConfig, store: &impl ConfigPort) -> Result<()> {
    let report = config.validate();
    if !report.valid {
        for e in &report.errors {
            warn!("config: {e}");
        }
        bail!("configuration invalid ({} error(s))", report.errors.len());
    }

    // ── Bus bring-up ──────────────────────────────────────────
    let mut client = NodeClient::with_retries(
        VirtualChain::new(args.nodes),
        config.settings.controller.bus_retries,
    );
    let assigned = client.enumerate().context("enumerating node chain")?;
    info!("Enumerated {} expansion node(s): {:?}", assigned.len(), assigned);
    for node in &config.nodes {
        if node.node_id != CONTROLLER_NODE_ID && !assigned.contains(&node.node_id) {
            warn!("Configured node {} was not found on the bus", node.node_id);
        }
    }

    // ── Controller ────────────────────────────────────────────
    let poll_ms = u64::from(config.settings.controller.poll_interval_ms);
    let mut sink = LogEventSink::new();
    let mut service = ControllerService::new(config);
    service.start(&mut sink);

    let clock = ManualClock::new();
    let wall = SystemClock::new();
    let mut humidity = Humidity::new(55.0);

    let mut cycle = 0;
    while args.cycles == 0 || cycle < args.cycles {
        cycle += 1;
        client
            .bus_mut()
            .set_sensor(CONTROLLER_NODE_ID, SensorType::Humidity, humidity.step());
        if let Some(now) = wall.wall_time() {
            clock.set_wall_time(now.day, (now.minute_of_day / 60) as u8, (now.minute_of_day % 60) as u8);
        }

        service.tick(&mut client, &clock, &mut sink);
        service.auto_save_if_needed(store);

        clock.advance_ms(poll_ms);
        if args.interval_ms > 0 {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    service.force_save_if_dirty(store);
    info!(
        "Done after {} cycle(s), {} event(s), {} port(s) on",
        service.cycle_count(),
        sink.emitted(),
        service.dispatcher().ports_on()
    );
    Ok(())
}

/// Controller plus `slaves` expansion nodes, with a mister on the
/// controller's first port and a fan on the last node.
fn demo_config(slaves: usize) -> ControllerConfig {
    let mut config = ControllerConfig::default();
    let last_node = CONTROLLER_NODE_ID + slaves.min(15) as u8;
    for id in CONTROLLER_NODE_ID + 1..=last_node {
        config.nodes.push(NodeConfig::with_default_ports(id));
    }

    if let Some(port) = config.nodes[0].ports.first_mut() {
        port.port_type = PortType::Mister;
        port.name = "Mister".into();
    }

    let mut mister = Rule::new(
        "mister-on",
        "Mister when dry",
        RuleCondition::threshold("humidity", ComparisonOperator::Lt, 45.0, Some(5.0)),
        RuleAction::set_port(CONTROLLER_NODE_ID, 1, true, Some(10.0)),
    );
    mister.description = Some("Keep humidity above 45% with 5% hysteresis".into());
    config.rules.push(mister);

    config.rules.push(Rule::new(
        "fan-on",
        "Fan when humid",
        RuleCondition::threshold("humidity", ComparisonOperator::Gte, 60.0, Some(3.0)),
        RuleAction::set_port(last_node, 2, true, Some(5.0)),
    ));

    config
}

/// Triangle wave between 35 and 65 %RH.
struct Humidity {
    value: f64,
    rising: bool,
}

impl Humidity {
    fn new(start: f64) -> Self {
        Self { value: start, rising: false }
    }

    fn step(&mut self) -> f64 {
        if self.value <= 35.0 {
            self.rising = true;
        } else if self.value >= 65.0 {
            self.rising = false;
        }
        self.value += if self.rising { 1.5 } else { -1.5 };
        self.value
    }
}
