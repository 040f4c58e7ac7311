//! Test support: one-time tracing setup and fixture builders

use std::env;
use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Difficulty, Node, ProblemNode, TreasureNode, TreasureTier};

static TEST_SETUP: Once = Once::new();

/// Install the test subscriber once per process. `RUST_LOG` wins when set.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    let fallback = env::var("PATHXP_TEST_LOG").unwrap_or_else(|_| "debug".into());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// A small learning path: `n` problems cycling through the difficulties and
/// tag sets, followed by one treasure per tier.
pub fn sample_path(n: usize) -> Vec<Node> {
    const TAGS: [&[&str]; 3] = [
        &[],
        &["highFrequencyInterview"],
        &["classicAlgorithm", "hasAnimation"],
    ];
    let mut nodes: Vec<Node> = (0..n)
        .map(|i| {
            ProblemNode::new(format!("problem-{i:03}"), Difficulty::ALL[i % 3])
                .with_tags(TAGS[(i / 3) % 3].iter().copied())
                .with_title(format!("Problem {i}"))
                .into()
        })
        .collect();
    nodes.extend(
        TreasureTier::ALL
            .iter()
            .enumerate()
            .map(|(i, tier)| TreasureNode::new(format!("treasure-{tier}"), *tier, i as u32).into()),
    );
    nodes
}
