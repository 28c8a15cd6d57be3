use agentcore::error::AgentCoreError;
use agentcore::node::NodeState;
use agentcore::termination::{
    any_terminates, BoxedTermination, ChainOfThoughtTermination, MaxRoundTermination,
    NoImprovementTermination, ScoreBasedTermination, StopMessageTermination, Termination,
};

fn reasoning(next_action: &str, confidence: f64) -> String {
    serde_json::json!({
        "steps": [
            {"thought": "look around", "next_action": "continue", "confidence": 0.2},
            {"thought": "answer", "next_action": next_action, "confidence": confidence},
        ]
    })
    .to_string()
}

#[test]
fn round_limit_fires_when_round_reaches_max() -> anyhow::Result<()> {
    let policy = ChainOfThoughtTermination::new();
    let output = reasoning("continue", 0.1);

    assert!(!policy.terminate(&NodeState::snapshot("cot", &output, 2, 3))?);
    assert!(policy.terminate(&NodeState::snapshot("cot", &output, 3, 3))?);
    Ok(())
}

#[test]
fn explicit_terminate_wins_over_low_confidence() -> anyhow::Result<()> {
    let policy = ChainOfThoughtTermination::new();
    let output = reasoning("Terminate", 0.0);
    assert!(policy.terminate(&NodeState::snapshot("cot", &output, 1, 10))?);
    Ok(())
}

#[test]
fn only_the_last_step_counts() -> anyhow::Result<()> {
    let policy = ChainOfThoughtTermination::with_threshold(0.5);
    assert!(policy.terminate(&NodeState::snapshot("cot", &reasoning("continue", 0.6), 1, 10))?);
    assert!(!policy.terminate(&NodeState::snapshot("cot", &reasoning("continue", 0.4), 1, 10))?);
    Ok(())
}

#[test]
fn fenced_reasoning_is_accepted() -> anyhow::Result<()> {
    let output = format!("```json\n{}\n```", reasoning("terminate", 0.0));
    assert!(ChainOfThoughtTermination::new().terminate(&NodeState::snapshot("cot", &output, 1, 10))?);
    Ok(())
}

#[test]
fn empty_steps_is_a_contract_violation() {
    let err = ChainOfThoughtTermination::new()
        .terminate(&NodeState::snapshot("cot", r#"{"steps": []}"#, 5, 5))
        .unwrap_err();
    assert!(matches!(err, AgentCoreError::ContractViolation(_)));
}

#[test]
fn non_json_output_is_a_contract_violation() {
    let err = ChainOfThoughtTermination::new()
        .terminate(&NodeState::snapshot("cot", "I think we are done", 1, 5))
        .unwrap_err();
    assert!(matches!(err, AgentCoreError::ContractViolation(_)));
}

#[test]
fn any_terminates_checks_every_policy() -> anyhow::Result<()> {
    let policies: Vec<BoxedTermination> =
        vec![Box::new(StopMessageTermination), Box::new(MaxRoundTermination)];

    assert!(!any_terminates(&policies, &NodeState::snapshot("n", "working", 1, 3))?);
    assert!(any_terminates(&policies, &NodeState::snapshot("n", "TERMINATE", 1, 3))?);
    assert!(any_terminates(&policies, &NodeState::snapshot("n", "working", 3, 3))?);
    Ok(())
}

#[test]
fn score_target_must_be_on_the_ten_point_scale() {
    assert!(matches!(
        ScoreBasedTermination::new(0),
        Err(AgentCoreError::InvalidConfig(_))
    ));
    assert!(ScoreBasedTermination::new(11).is_err());
    assert!(ScoreBasedTermination::new(10).is_ok());
}

#[test]
fn score_is_read_from_embedded_json() -> anyhow::Result<()> {
    let policy = ScoreBasedTermination::new(8)?;
    let output = r#"Evaluation follows: {"score": 9, "pass": false, "feedback": "tight"} end"#;
    assert!(policy.terminate(&NodeState::snapshot("critic", output, 1, 5))?);

    let strict = ScoreBasedTermination::new(8)?.with_pass();
    assert!(!strict.terminate(&NodeState::snapshot("critic", output, 1, 5))?);
    let passed = r#"{"score": 8, "pass": true}"#;
    assert!(strict.terminate(&NodeState::snapshot("critic", passed, 1, 5))?);
    Ok(())
}

#[test]
fn score_falls_back_to_plain_text() -> anyhow::Result<()> {
    let policy = ScoreBasedTermination::new(7)?;
    for (output, expected) in [
        ("Score: 8", true),
        ("overall 7/10", true),
        ("得分：9", true),
        ("评分: 3", false),
        ("no verdict yet", false),
        ("", false),
    ] {
        assert_eq!(
            policy.terminate(&NodeState::snapshot("critic", output, 1, 5))?,
            expected,
            "{output}"
        );
    }
    Ok(())
}

#[test]
fn stalled_scores_stop_the_loop() -> anyhow::Result<()> {
    let policy = NoImprovementTermination::default();
    let round = |output: &str, round: u32| NodeState::snapshot("critic", output, round, 10);

    assert!(!policy.terminate(&round(r#"{"score": 6}"#, 1))?);
    assert!(!policy.terminate(&round("Score: 8", 2))?);
    assert!(!policy.terminate(&round("8/10", 3))?);
    assert!(policy.terminate(&round("得分：8", 4))?);
    assert_eq!(policy.score_history(), vec![6, 8, 8, 8]);

    policy.reset();
    assert!(policy.score_history().is_empty());
    assert_eq!(policy.average_improvement_rate(), 0.0);
    Ok(())
}

#[test]
fn score_drop_after_round_two_stops() -> anyhow::Result<()> {
    let policy = NoImprovementTermination::new(5, 5.0);
    let round = |output: &str, round: u32| NodeState::snapshot("critic", output, round, 10);

    assert!(!policy.terminate(&round("score: 5", 1))?);
    assert!(!policy.terminate(&round("score: 4", 2))?);
    assert!(policy.terminate(&round("score: 3", 3))?);
    assert!(!policy.terminate(&round("nothing numeric", 4))?);
    Ok(())
}

#[test]
fn average_improvement_rate_spans_the_history() -> anyhow::Result<()> {
    let policy = NoImprovementTermination::new(3, 5.0);
    let round = |output: &str, round: u32| NodeState::snapshot("critic", output, round, 10);
    policy.terminate(&round("score: 4", 1))?;
    policy.terminate(&round("score: 6", 2))?;
    policy.terminate(&round("score: 9", 3))?;
    assert!((policy.average_improvement_rate() - 50.0).abs() < 1e-9);
    Ok(())
}
