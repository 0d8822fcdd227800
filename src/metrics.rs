use tracing::trace;

// Counters are emitted as trace events; the Prometheus recorder only backs
// the /metrics endpoint.

pub fn inc_requests(route: &'static str) {
    trace!(target = "maison.metrics", route = route, "requests_total_inc");
}

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "maison.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn rows_parsed(valid: usize, invalid: usize) {
    trace!(
        target = "maison.metrics",
        valid = valid as u64,
        invalid = invalid as u64,
        "rows_parsed"
    );
}
