//! Tripline simulator.
//!
//! Scrolls a synthetic itinerary through the viewport, feeding position and
//! dwell signals to the prefetch engine while the scheduler loads content
//! with injected failures, then prints what was loaded.

mod itinerary;

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use indexmap::IndexSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::info;
use tripline_config::TriplineConfig;
use tripline_prefetch::PrefetchEngine;
use tripline_scheduler::{Scheduler, SchedulerStats};
use tripline_viewport::{DwellTracker, VirtualList};

use crate::itinerary::Itinerary;

/// Simulator command line arguments.
#[derive(Parser, Debug)]
#[command(name = "tripline-sim")]
#[command(about = "Drive the tripline loading pipeline against a synthetic itinerary")]
struct Args {
	/// Number of itinerary days
	#[arg(long, default_value_t = 30)]
	days: usize,

	/// Content items per day besides the day summary
	#[arg(long, default_value_t = 6)]
	items_per_day: usize,

	/// Probability that a load attempt fails
	#[arg(long, default_value_t = 0.1)]
	failure_rate: f64,

	/// Seed for the itinerary and the scroll pattern
	#[arg(long, default_value_t = 7)]
	seed: u64,

	/// Mean time spent per scroll step, in milliseconds
	#[arg(long, default_value_t = 250)]
	dwell_ms: u64,

	/// Configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Print the summary as JSON
	#[arg(long)]
	json: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
	days: usize,
	items: usize,
	scroll_steps: usize,
	prefetch_passes: u64,
	never_requested: usize,
	elapsed_ms: u64,
	#[serde(flatten)]
	stats: SchedulerStats,
	failures: Vec<FailureLine>,
}

#[derive(Debug, Serialize)]
struct FailureLine {
	id: String,
	kind: &'static str,
	error: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	anyhow::ensure!((0.0..=1.0).contains(&args.failure_rate), "--failure-rate must be between 0 and 1");

	let (config, source) = TriplineConfig::discover(args.config.as_deref()).context("loading configuration")?;
	match &source {
		Some(path) => info!(path = %path.display(), "configuration loaded"),
		None => info!("using default configuration"),
	}
	for warning in &config.warnings {
		tracing::warn!(%warning, "configuration warning");
	}

	let mut rng = StdRng::seed_from_u64(args.seed);
	let itinerary = Itinerary::generate(&mut rng, args.days, args.items_per_day, args.failure_rate);
	info!(days = itinerary.days.len(), items = itinerary.item_count(), "itinerary generated");

	let scheduler = Scheduler::new(config.scheduler.clone());
	let engine = PrefetchEngine::new(config.prefetch.clone(), scheduler.clone());
	engine.set_days(itinerary.day_ids());
	engine.add_candidates(itinerary.prefetchable());

	let _queue_log = scheduler.subscribe(|snap| {
		tracing::trace!(
			revision = snap.revision,
			pending = snap.pending.len(),
			in_flight = snap.in_flight.len(),
			completed = snap.completed.len(),
			"sim.queue"
		);
	});

	let total_days = itinerary.days.len();
	let mut list = VirtualList::from_config(&config.viewport, total_days);
	let observer = engine.clone();
	list.on_position_change(move |change| {
		if let Some(range) = change.range {
			observer.update_current_position(range.visible_start, total_days);
		}
	});

	let started = Instant::now();
	let mut dwell = DwellTracker::new(engine.clone());
	let mut shown = IndexSet::new();
	show_rows(&list, &itinerary, &scheduler, &engine, &mut dwell, &mut shown);

	let row_height = config.viewport.row_height;
	let last_row = (list.spec().max_scroll_offset() / row_height).ceil() as usize;
	let mut row = 0usize;
	let mut steps = 0usize;
	while row < last_row && steps < total_days.saturating_mul(3) {
		steps += 1;
		row = if row > 0 && rng.random_bool(0.15) { row - 1 } else { row + 1 };
		list.scroll_to_index(row, Instant::now());
		show_rows(&list, &itinerary, &scheduler, &engine, &mut dwell, &mut shown);

		let mut pause = Duration::from_millis(rng.random_range(pause_range(args.dwell_ms)));
		if rng.random_bool(0.2) {
			pause += config.prefetch.prefetch_delay() + Duration::from_millis(50);
		}
		tracing::debug!(row, pause_ms = pause.as_millis() as u64, "sim.step");
		tokio::time::sleep(pause).await;
	}

	dwell.flush(Instant::now());
	let pass = engine.flush();
	info!(selected = pass.selected.len(), admitted = pass.admitted, "final prefetch pass");

	if tokio::time::timeout(Duration::from_secs(120), scheduler.settled()).await.is_err() {
		tracing::warn!("scheduler did not settle within 120s");
	}

	let snapshot = scheduler.snapshot();
	let summary = Summary {
		days: total_days,
		items: itinerary.item_count(),
		scroll_steps: steps,
		prefetch_passes: engine.passes(),
		never_requested: engine.candidate_count(),
		elapsed_ms: started.elapsed().as_millis() as u64,
		stats: scheduler.stats(),
		failures: snapshot
			.failed
			.iter()
			.map(|f| FailureLine {
				id: f.task.id.to_string(),
				kind: f.error.kind().as_str(),
				error: f.error.to_string(),
			})
			.collect(),
	};

	if args.json {
		println!("{}", serde_json::to_string_pretty(&summary)?);
	} else {
		print_summary(&summary);
	}

	Ok(())
}

/// Requests content for the mounted rows and keeps visibility and dwell in
/// step with the strictly visible band.
fn show_rows(
	list: &VirtualList,
	itinerary: &Itinerary,
	scheduler: &Scheduler,
	engine: &PrefetchEngine,
	dwell: &mut DwellTracker<PrefetchEngine>,
	shown: &mut IndexSet<usize>,
) {
	let now = Instant::now();
	let window = list.render(&itinerary.days, now, |day, _, ctx| day.tasks(ctx.fidelity, ctx.fully_visible));

	for (_, tasks) in window.rows {
		for task in tasks {
			engine.remove_candidates([task.id.as_str()]);
			let (id, visible) = (task.id.clone(), task.is_visible);
			if !scheduler.add_task(task) {
				scheduler.update_visibility(id.as_str(), visible);
			}
		}
	}

	let visible: IndexSet<usize> = window.range.map(|r| (r.visible_start..=r.visible_end).collect()).unwrap_or_default();
	for &index in shown.difference(&visible) {
		for item in &itinerary.days[index].items {
			scheduler.update_visibility(item.id.as_str(), false);
		}
	}
	dwell.sync_visible(visible.iter().map(|&i| itinerary.days[i].id.as_str()), now);
	*shown = visible;
}

/// Per-step pause in milliseconds, spread from half to double the mean.
fn pause_range(mean_ms: u64) -> RangeInclusive<u64> {
	let mean = mean_ms.max(1);
	mean / 2..=mean.saturating_mul(2)
}

fn print_summary(summary: &Summary) {
	println!("days:             {}", summary.days);
	println!("items:            {}", summary.items);
	println!("scroll steps:     {}", summary.scroll_steps);
	println!("prefetch passes:  {}", summary.prefetch_passes);
	println!("completed:        {}", summary.stats.completed);
	println!("failed:           {}", summary.stats.failed);
	println!("still pending:    {}", summary.stats.pending);
	println!("never requested:  {}", summary.never_requested);
	println!("attempts:         {} ({} retried)", summary.stats.dispatched, summary.stats.retried);
	println!("elapsed:          {} ms", summary.elapsed_ms);
	for failure in &summary.failures {
		println!("  failed {} [{}]: {}", failure.id, failure.kind, failure.error);
	}
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("tripline=debug,warn")
			} else {
				EnvFilter::new("tripline=info,warn")
			}
		})
	};

	// TRIPLINE_LOG_DIR sends logs to a per-process file instead of stderr
	if let Some(log_dir) = std::env::var("TRIPLINE_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("tripline-sim.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);
			tracing_subscriber::registry().with(filter()).with(file_layer).init();
			tracing::info!(path = ?log_path, "tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}
