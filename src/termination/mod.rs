use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::constants::{actions, termination as fields};
use crate::error::{AgentCoreError, Result};
use crate::node::NodeState;
use crate::utils::strip_code_fence;

/// Pure predicate over a node's accumulated state.
pub trait Termination: Send + Sync {
    fn terminate(&self, node: &NodeState) -> Result<bool>;

    fn name(&self) -> &'static str;
}

pub type BoxedTermination = Box<dyn Termination>;

/// Stops once the round counter reaches the node's max round.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxRoundTermination;

impl Termination for MaxRoundTermination {
    fn terminate(&self, node: &NodeState) -> Result<bool> {
        Ok(node.round() >= node.max_round())
    }

    fn name(&self) -> &'static str {
        "max_round"
    }
}

/// Stops when the output opens with the terminate keyword.
#[derive(Debug, Default, Clone, Copy)]
pub struct StopMessageTermination;

impl Termination for StopMessageTermination {
    fn terminate(&self, node: &NodeState) -> Result<bool> {
        Ok(node.output().trim_start().starts_with(actions::TERMINATE))
    }

    fn name(&self) -> &'static str {
        "stop_message"
    }
}

/// Chain-of-thought policy over `{"steps": [{..., "next_action", "confidence"}]}`.
///
/// Checked in order, first hit wins:
/// 1. last step's `next_action` is `terminate` (any case)
/// 2. round >= max round
/// 3. last step's `confidence` above the threshold
///
/// Empty `steps` is an error. A malformed confidence only errors when
/// rule 3 is actually reached.
#[derive(Debug, Clone, Copy)]
pub struct ChainOfThoughtTermination {
    threshold: f64,
}

impl Default for ChainOfThoughtTermination {
    fn default() -> Self {
        Self {
            threshold: fields::CONFIDENCE_THRESHOLD,
        }
    }
}

impl ChainOfThoughtTermination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    fn last_step(node: &NodeState) -> Result<Value> {
        let parsed: Value = serde_json::from_str(strip_code_fence(node.output())).map_err(|err| {
            AgentCoreError::ContractViolation(format!(
                "node `{}` output is not a reasoning document: {}",
                node.name(),
                err
            ))
        })?;
        let steps = parsed
            .get(fields::STEPS)
            .and_then(Value::as_array)
            .ok_or_else(|| {
                AgentCoreError::ContractViolation(format!(
                    "node `{}` output has no `steps` sequence",
                    node.name()
                ))
            })?;
        steps.last().cloned().ok_or_else(|| {
            AgentCoreError::ContractViolation(format!(
                "node `{}` output has an empty `steps` sequence",
                node.name()
            ))
        })
    }
}

impl Termination for ChainOfThoughtTermination {
    fn terminate(&self, node: &NodeState) -> Result<bool> {
        let step = Self::last_step(node)?;

        let explicit = step
            .get(fields::NEXT_ACTION)
            .and_then(Value::as_str)
            .map(|action| action.eq_ignore_ascii_case(actions::TERMINATE))
            .unwrap_or(false);
        if explicit {
            debug!(node = %node.name(), "terminated by explicit action");
            return Ok(true);
        }

        if node.round() >= node.max_round() {
            debug!(node = %node.name(), round = node.round(), "terminated by round limit");
            return Ok(true);
        }

        let confidence = match step.get(fields::CONFIDENCE) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            AgentCoreError::ContractViolation(format!(
                "node `{}` last step has no numeric confidence",
                node.name()
            ))
        })?;
        Ok(confidence > self.threshold)
    }

    fn name(&self) -> &'static str {
        "chain_of_thought"
    }
}

/// First integer captured by any of `patterns`, tried in order.
fn first_score(patterns: &[Regex], text: &str) -> Option<u32> {
    patterns.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
    })
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
}

/// 评分文本回退模式，例如 "Score: 8/10" 或 "得分: 9"
static SCORE_TEXT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)score[:\s]+(\d+)",
        r"(?i)得分[：:\s]+(\d+)",
        r"(\d+)/10",
        r"评分[：:\s]+(\d+)",
    ])
});

#[derive(Debug, Default, Deserialize)]
struct Evaluation {
    #[serde(default)]
    score: i64,
    #[serde(default)]
    pass: bool,
}

/// Stops a reflection loop once the evaluator's score reaches the target.
///
/// The output is read as `{"score": n, "pass": bool}` (the outermost
/// braces are cut out first); when that fails, "score: n", "n/10",
/// "得分: n" and "评分: n" in plain text are accepted.
#[derive(Debug, Clone, Copy)]
pub struct ScoreBasedTermination {
    target: u32,
    require_pass: bool,
}

impl ScoreBasedTermination {
    pub fn new(target: u32) -> Result<Self> {
        if !(1..=10).contains(&target) {
            return Err(AgentCoreError::InvalidConfig(format!(
                "target score must be between 1 and 10, got {target}"
            )));
        }
        Ok(Self {
            target,
            require_pass: false,
        })
    }

    /// Also demand `"pass": true` in the JSON form.
    pub fn with_pass(mut self) -> Self {
        self.require_pass = true;
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn requires_pass(&self) -> bool {
        self.require_pass
    }

    fn evaluation(output: &str) -> Option<Evaluation> {
        let start = output.find('{')?;
        let end = output.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&output[start..=end]).ok()
    }
}

impl Termination for ScoreBasedTermination {
    fn terminate(&self, node: &NodeState) -> Result<bool> {
        let output = node.output();
        if output.is_empty() {
            return Ok(false);
        }
        if let Some(evaluation) = Self::evaluation(output) {
            let reached = evaluation.score >= i64::from(self.target);
            if reached && (!self.require_pass || evaluation.pass) {
                info!(node = %node.name(), score = evaluation.score, target = self.target, "score target reached");
                return Ok(true);
            }
        }
        Ok(first_score(&SCORE_TEXT, output).is_some_and(|score| {
            let reached = score >= self.target;
            if reached {
                info!(node = %node.name(), score, target = self.target, "score target reached in text");
            }
            reached
        }))
    }

    fn name(&self) -> &'static str {
        "score_based"
    }
}

static SCORE_ANY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r#""score"\s*:\s*(\d+)"#,
        r"(?i)score\s*[：:=]\s*(\d+)",
        r"得分\s*[：:=]\s*(\d+)",
        r"评分\s*[：:=]\s*(\d+)",
        r"(\d+)\s*/\s*10",
        r"(?i)\bscore\b.*?(\d+)",
    ])
});

#[derive(Debug, Default)]
struct ScoreTrail {
    history: Vec<u32>,
    stalled: u32,
}

fn improvement_rate(last: u32, current: u32) -> f64 {
    if last == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    (f64::from(current) - f64::from(last)) / f64::from(last) * 100.0
}

/// Stops a reflection loop whose score has stalled.
///
/// Each call records the score found in the output. Fires after
/// `max_rounds` consecutive rounds improving by less than `min_rate`
/// percent, or when the score drops after round 2. Keeps history across
/// calls; call [`NoImprovementTermination::reset`] between runs.
#[derive(Debug)]
pub struct NoImprovementTermination {
    max_rounds: u32,
    min_rate: f64,
    trail: Mutex<ScoreTrail>,
}

impl Default for NoImprovementTermination {
    fn default() -> Self {
        Self::new(2, 5.0)
    }
}

impl NoImprovementTermination {
    pub fn new(max_rounds: u32, min_rate: f64) -> Self {
        Self {
            max_rounds,
            min_rate,
            trail: Mutex::new(ScoreTrail::default()),
        }
    }

    pub fn score_history(&self) -> Vec<u32> {
        self.trail.lock().history.clone()
    }

    /// Mean improvement rate between consecutive recorded scores.
    pub fn average_improvement_rate(&self) -> f64 {
        let trail = self.trail.lock();
        if trail.history.len() < 2 {
            return 0.0;
        }
        let rates: Vec<f64> = trail
            .history
            .windows(2)
            .map(|pair| improvement_rate(pair[0], pair[1]))
            .collect();
        rates.iter().sum::<f64>() / rates.len() as f64
    }

    pub fn reset(&self) {
        let mut trail = self.trail.lock();
        trail.history.clear();
        trail.stalled = 0;
    }
}

impl Termination for NoImprovementTermination {
    fn terminate(&self, node: &NodeState) -> Result<bool> {
        let Some(current) = first_score(&SCORE_ANY, node.output()) else {
            return Ok(false);
        };
        let mut trail = self.trail.lock();
        let Some(&last) = trail.history.last() else {
            trail.history.push(current);
            return Ok(false);
        };

        let rate = improvement_rate(last, current);
        debug!(node = %node.name(), round = node.round(), current, last, rate, "score recorded");
        trail.history.push(current);

        if rate < self.min_rate {
            trail.stalled += 1;
            if trail.stalled >= self.max_rounds {
                info!(node = %node.name(), rounds = trail.stalled, "no improvement, stopping");
                return Ok(true);
            }
        } else {
            trail.stalled = 0;
        }

        if current < last && node.round() > 2 {
            info!(node = %node.name(), last, current, "score dropped, stopping");
            return Ok(true);
        }
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "no_improvement"
    }
}

/// True when any of `terminations` fires; errors propagate.
pub fn any_terminates(terminations: &[BoxedTermination], node: &NodeState) -> Result<bool> {
    for termination in terminations {
        if termination.terminate(node)? {
            debug!(node = %node.name(), policy = termination.name(), "termination fired");
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(output: &str, round: u32, max_round: u32) -> NodeState {
        NodeState::snapshot("thinker", output, round, max_round)
    }

    #[test]
    fn high_confidence_terminates() {
        let output = r#"{"steps":[{"next_action":"continue","confidence":0.95}]}"#;
        assert!(ChainOfThoughtTermination::new()
            .terminate(&node(output, 1, 5))
            .unwrap());
    }

    #[test]
    fn low_confidence_continues() {
        let output = r#"{"steps":[{"next_action":"continue","confidence":0.5}]}"#;
        assert!(!ChainOfThoughtTermination::new()
            .terminate(&node(output, 1, 5))
            .unwrap());
    }

    #[test]
    fn malformed_confidence_errors_only_when_reached() {
        let output = r#"{"steps":[{"next_action":"continue","confidence":"high"}]}"#;
        let policy = ChainOfThoughtTermination::new();
        assert!(policy.terminate(&node(output, 5, 5)).unwrap());
        assert!(policy.terminate(&node(output, 1, 5)).is_err());
    }

    #[test]
    fn empty_steps_is_contract_violation() {
        let err = ChainOfThoughtTermination::new()
            .terminate(&node(r#"{"steps":[]}"#, 1, 5))
            .unwrap_err();
        assert!(matches!(err, AgentCoreError::ContractViolation(_)));
    }

    #[test]
    fn stop_message_matches_prefix() {
        assert!(StopMessageTermination
            .terminate(&node("TERMINATE all done", 1, 5))
            .unwrap());
        assert!(!StopMessageTermination
            .terminate(&node("not yet", 1, 5))
            .unwrap());
    }
}
