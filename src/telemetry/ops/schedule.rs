use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Schedule;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Start, Tick, Attempt }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self { Phase::Start => "start", Phase::Tick => "tick", Phase::Attempt => "attempt" } }
    fn span(&self) -> Span { match self { Phase::Start => info_span!("start"), Phase::Tick => info_span!("tick"), Phase::Attempt => info_span!("attempt") } }
}

impl OpMarker for Schedule {
    const NAME: &'static str = "schedule";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("schedule") }
}
