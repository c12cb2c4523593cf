use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Import;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Prepare, Feed, Fetch, Filter, Dedup, Normalize, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Plan => "plan",
        Phase::Prepare => "prepare",
        Phase::Feed => "feed",
        Phase::Fetch => "fetch",
        Phase::Filter => "filter",
        Phase::Dedup => "dedup",
        Phase::Normalize => "normalize",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Plan => info_span!("plan"),
        Phase::Prepare => info_span!("prepare"),
        Phase::Feed => info_span!("feed"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Filter => info_span!("filter"),
        Phase::Dedup => info_span!("dedup"),
        Phase::Normalize => info_span!("normalize"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Import {
    const NAME: &'static str = "import";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("import") }
}
