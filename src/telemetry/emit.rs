use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use crate::output::config::OutputConfig;
use crate::output::types::{Envelope, Meta};
use crate::output::Emitter;

pub fn print_plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::plan(op, plan, meta)?;
    Emitter::new(OutputConfig::from_env()).emit(&env)?;
    Ok(())
}

pub fn print_result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<()> {
    let env = Envelope::result(op, result, meta)?;
    Emitter::new(OutputConfig::from_env()).emit(&env)?;
    Ok(())
}

/// Result envelope carrying the wall time since `started`.
pub fn print_timed_result<T: Serialize>(op: &'static str, result: &T, started: Instant) -> Result<()> {
    print_result(op, result, Some(Meta::since(started)))
}
