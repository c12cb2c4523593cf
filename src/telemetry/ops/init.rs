use tracing::{info_span, Span};

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Init;

/// `seed` covers the optional admin user written after migrations.
#[derive(Copy, Clone, Debug)]
pub enum Phase { Plan, Migrate, Seed }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str {
        match self { Phase::Plan => "plan", Phase::Migrate => "migrate", Phase::Seed => "seed" }
    }
    fn span(&self) -> Span { info_span!("init_phase", phase = self.name()) }
}

impl OpMarker for Init {
    const NAME: &'static str = "init";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("init") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_phase_is_named() {
        assert_eq!(Phase::Seed.name(), "seed");
        assert_eq!(Phase::Migrate.name(), "migrate");
    }
}
